//! The trust-store backed socket factory.
//!
//! [`TrustStoreSocketFactory`] is built once from a [`TrustStoreConfig`]:
//!
//! 1. resolve the store type (default `JKS`);
//! 2. read and parse the store, checking its integrity when a password is set;
//! 3. resolve the protocol (default `TLSv1.2`);
//! 4. build the backend's root store and client context from the anchors.
//!
//! After that it is immutable. Socket creation dials TCP when asked to and
//! hands the handshake to the context; I/O and TLS errors come back exactly as
//! the backend reported them.
//!
//! Frameworks that discover their socket factory by convention call
//! [`get_default`], which reads the configuration from the environment and
//! shares one factory across the process.
//!
//! ```rust,no_run
//! use truststore_tls::{SocketFactory, TrustStoreConfig, TrustStoreSocketFactory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TrustStoreConfig::builder()
//!     .path("/etc/ldap/truststore.p12")
//!     .password("changeit")
//!     .store_type("PKCS12")
//!     .protocol("TLSv1.3")
//!     .build();
//! let factory = TrustStoreSocketFactory::create(&config)?;
//! let socket = factory.create_socket("ldap.example.com", 636).await?;
//! println!("connected with {:?}", socket.negotiated_protocol());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tokio::net::{TcpSocket, TcpStream};
use tracing::{debug, info};

use crate::config::{EnvProperties, PropertySource, TrustStoreConfig};
use crate::connector::{AnyTlsConnector, ContextConfig, TlsBackend, TlsConnector};
use crate::error::{TrustStoreError, TrustStoreResult};
use crate::net::{self, TlsSocket};
use crate::protocol::TlsProtocol;
use crate::store::{StoreType, TrustStore};

/// Socket creation as seen by a TLS-consuming client library.
#[async_trait]
pub trait SocketFactory: Send + Sync + fmt::Debug {
    /// TLS socket to `host:port`; `host` is also the verified server name.
    async fn create_socket(&self, host: &str, port: u16) -> io::Result<TlsSocket>;

    /// TLS socket to `addr:port`, verified against the IP address.
    async fn create_socket_to_addr(&self, addr: IpAddr, port: u16) -> io::Result<TlsSocket>;

    /// Like [`create_socket`](Self::create_socket), bound locally to
    /// `local_addr:local_port` (port 0 picks an ephemeral port).
    async fn create_socket_from(
        &self,
        host: &str,
        port: u16,
        local_addr: IpAddr,
        local_port: u16,
    ) -> io::Result<TlsSocket>;

    /// Like [`create_socket_to_addr`](Self::create_socket_to_addr), bound locally.
    async fn create_socket_to_addr_from(
        &self,
        addr: IpAddr,
        port: u16,
        local_addr: IpAddr,
        local_port: u16,
    ) -> io::Result<TlsSocket>;

    /// TLS on top of an already connected stream.
    async fn create_layered_socket(&self, tcp: TcpStream, host: &str) -> io::Result<TlsSocket>;

    /// Connect a caller-prepared socket to `remote`, then run the handshake.
    async fn create_socket_with(
        &self,
        socket: TcpSocket,
        remote: SocketAddr,
        server_name: &str,
    ) -> io::Result<TlsSocket>;

    fn default_cipher_suites(&self) -> Vec<String>;

    fn supported_cipher_suites(&self) -> Vec<String>;
}

/// Socket factory whose TLS context trusts exactly the configured store.
#[derive(Debug, Clone)]
pub struct TrustStoreSocketFactory {
    connector: AnyTlsConnector,
    store_type: StoreType,
    protocol: TlsProtocol,
    anchors: usize,
}

impl TrustStoreSocketFactory {
    /// Build a new factory from explicit configuration.
    pub fn create(config: &TrustStoreConfig) -> TrustStoreResult<Self> {
        let store_type = StoreType::resolve(config.store_type())?;
        let path = config
            .path()
            .ok_or_else(|| TrustStoreError::config("no trust store path configured"))?;
        let store = TrustStore::load(path, config.password(), store_type)?;

        let protocol = TlsProtocol::resolve(config.protocol())?;
        let backend = config.backend().unwrap_or_default();
        let connector = AnyTlsConnector::build(
            backend,
            ContextConfig {
                anchors: store.anchors(),
                protocol,
                include_platform_roots: config.include_platform_roots(),
            },
        )?;

        info!(
            path = %path.display(),
            %store_type,
            %protocol,
            %backend,
            anchors = store.len(),
            "trust store socket factory ready"
        );
        Ok(Self {
            connector,
            store_type,
            protocol,
            anchors: store.len(),
        })
    }

    /// Build a new factory from properties (see [`TrustStoreConfig::from_properties`]).
    pub fn from_properties(source: &impl PropertySource) -> TrustStoreResult<Self> {
        Self::create(&TrustStoreConfig::from_properties(source)?)
    }

    /// The process-wide factory; see [`get_default`].
    pub fn get_default() -> TrustStoreResult<Arc<Self>> {
        get_default()
    }

    /// The TLS context every socket is handed to.
    pub fn connector(&self) -> &AnyTlsConnector {
        &self.connector
    }

    pub fn backend(&self) -> TlsBackend {
        self.connector.backend()
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn protocol(&self) -> TlsProtocol {
        self.protocol
    }

    /// Number of certificates taken from the trust store.
    pub fn anchor_count(&self) -> usize {
        self.anchors
    }
}

#[async_trait]
impl SocketFactory for TrustStoreSocketFactory {
    async fn create_socket(&self, host: &str, port: u16) -> io::Result<TlsSocket> {
        let tcp = net::dial(host, port).await?;
        self.connector.connect(tcp, host).await
    }

    async fn create_socket_to_addr(&self, addr: IpAddr, port: u16) -> io::Result<TlsSocket> {
        let tcp = TcpStream::connect(SocketAddr::new(addr, port)).await?;
        self.connector.connect(tcp, &addr.to_string()).await
    }

    async fn create_socket_from(
        &self,
        host: &str,
        port: u16,
        local_addr: IpAddr,
        local_port: u16,
    ) -> io::Result<TlsSocket> {
        let local = SocketAddr::new(local_addr, local_port);
        let tcp = net::dial_from(host, port, local).await?;
        self.connector.connect(tcp, host).await
    }

    async fn create_socket_to_addr_from(
        &self,
        addr: IpAddr,
        port: u16,
        local_addr: IpAddr,
        local_port: u16,
    ) -> io::Result<TlsSocket> {
        let tcp = net::connect_bound(
            SocketAddr::new(addr, port),
            SocketAddr::new(local_addr, local_port),
        )
        .await?;
        self.connector.connect(tcp, &addr.to_string()).await
    }

    async fn create_layered_socket(&self, tcp: TcpStream, host: &str) -> io::Result<TlsSocket> {
        self.connector.connect(tcp, host).await
    }

    async fn create_socket_with(
        &self,
        socket: TcpSocket,
        remote: SocketAddr,
        server_name: &str,
    ) -> io::Result<TlsSocket> {
        let tcp = socket.connect(remote).await?;
        self.connector.connect(tcp, server_name).await
    }

    fn default_cipher_suites(&self) -> Vec<String> {
        self.connector.default_cipher_suites()
    }

    fn supported_cipher_suites(&self) -> Vec<String> {
        self.connector.supported_cipher_suites()
    }
}

/// Lazily built factory shared by every caller.
///
/// The first successful build wins; concurrent first callers block until it
/// is done and then receive the same `Arc`. A failed build is not cached, so
/// a later call tries again.
#[derive(Debug, Default)]
pub struct SharedFactory {
    cell: OnceCell<Arc<TrustStoreSocketFactory>>,
}

impl SharedFactory {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// The shared factory, building it with `build` if nobody has yet.
    pub fn get_or_try_init<F>(&self, build: F) -> TrustStoreResult<Arc<TrustStoreSocketFactory>>
    where
        F: FnOnce() -> TrustStoreResult<TrustStoreSocketFactory>,
    {
        self.cell.get_or_try_init(|| build().map(Arc::new)).cloned()
    }

    /// The shared factory, building it from `source` if nobody has yet.
    pub fn get_or_init_from(
        &self,
        source: &impl PropertySource,
    ) -> TrustStoreResult<Arc<TrustStoreSocketFactory>> {
        self.get_or_try_init(|| TrustStoreSocketFactory::from_properties(source))
    }

    /// The factory, if it has been built.
    pub fn get(&self) -> Option<Arc<TrustStoreSocketFactory>> {
        self.cell.get().cloned()
    }
}

static DEFAULT_FACTORY: SharedFactory = SharedFactory::new();

/// The process-wide factory, configured from environment variables.
///
/// See [`crate::config`] for the variable names. Errors are returned to the
/// caller, never swallowed; the next call retries.
pub fn get_default() -> TrustStoreResult<Arc<TrustStoreSocketFactory>> {
    DEFAULT_FACTORY
        .get_or_init_from(&EnvProperties)
        .inspect_err(|e| debug!(kind = e.kind(), "default socket factory unavailable: {e}"))
}
