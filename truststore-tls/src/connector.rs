//! TLS client contexts.
//!
//! A small facade over the concrete TLS backends (rustls or OpenSSL). Each
//! backend turns the trust store's anchors into its own root store, builds one
//! client context for the configured protocol and then only performs
//! handshakes. [`AnyTlsConnector`] picks the backend at runtime among those
//! compiled in.

#[cfg(feature = "tls-rustls")]
pub mod rustls;

#[cfg(feature = "tls-openssl")]
pub mod openssl;

#[cfg(not(any(feature = "tls-rustls", feature = "tls-openssl")))]
compile_error!("Enable at least one TLS backend feature: `tls-rustls` or `tls-openssl`.");

use std::fmt;
use std::io;
use std::str::FromStr;

use async_trait::async_trait;
use rustls_pki_types::CertificateDer;
use tokio::net::TcpStream;

use crate::error::{TrustStoreError, TrustStoreResult};
use crate::net::TlsSocket;
use crate::protocol::TlsProtocol;
use crate::unsupported_error;

/// Available TLS backends. Compile-time features decide which ones work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsBackend {
    Rustls,
    Openssl,
}

impl TlsBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            TlsBackend::Rustls => "rustls",
            TlsBackend::Openssl => "openssl",
        }
    }

    /// Whether this backend was compiled in.
    pub fn is_available(self) -> bool {
        match self {
            TlsBackend::Rustls => cfg!(feature = "tls-rustls"),
            TlsBackend::Openssl => cfg!(feature = "tls-openssl"),
        }
    }
}

impl Default for TlsBackend {
    /// rustls when compiled in, OpenSSL otherwise.
    fn default() -> Self {
        if cfg!(feature = "tls-rustls") {
            TlsBackend::Rustls
        } else {
            TlsBackend::Openssl
        }
    }
}

impl fmt::Display for TlsBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsBackend {
    type Err = TrustStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rustls" => Ok(TlsBackend::Rustls),
            "openssl" => Ok(TlsBackend::Openssl),
            other => Err(unsupported_error!("unknown TLS backend {other:?}")),
        }
    }
}

/// Inputs shared by every backend when building a client context.
#[derive(Debug, Clone, Copy)]
pub struct ContextConfig<'a> {
    /// DER anchors from the trust store.
    pub anchors: &'a [CertificateDer<'static>],
    pub protocol: TlsProtocol,
    /// Add the platform's roots next to `anchors`.
    pub include_platform_roots: bool,
}

/// What a built TLS context offers to the socket factory.
#[async_trait]
pub trait TlsConnector: Send + Sync + fmt::Debug {
    /// Run a client handshake over `tcp`. `server_name` is used for SNI and
    /// certificate verification and may be a DNS name or an IP address.
    async fn connect(&self, tcp: TcpStream, server_name: &str) -> io::Result<TlsSocket>;

    /// Cipher suites enabled for the configured protocol.
    fn default_cipher_suites(&self) -> Vec<String>;

    /// Every cipher suite the backend can offer.
    fn supported_cipher_suites(&self) -> Vec<String>;
}

/// Type-erased connector over the compiled-in backends.
#[derive(Debug, Clone)]
pub enum AnyTlsConnector {
    #[cfg(feature = "tls-rustls")]
    Rustls(rustls::RustlsConnector),
    #[cfg(feature = "tls-openssl")]
    Openssl(openssl::OpensslConnector),
}

impl AnyTlsConnector {
    /// Build a client context on `backend`.
    pub fn build(backend: TlsBackend, cfg: ContextConfig<'_>) -> TrustStoreResult<Self> {
        match backend {
            #[cfg(feature = "tls-rustls")]
            TlsBackend::Rustls => Ok(AnyTlsConnector::Rustls(rustls::RustlsConnector::new(cfg)?)),
            #[cfg(feature = "tls-openssl")]
            TlsBackend::Openssl => Ok(AnyTlsConnector::Openssl(
                openssl::OpensslConnector::new(cfg)?,
            )),
            #[allow(unreachable_patterns)]
            other => Err(unsupported_error!(
                "TLS backend {other} is not compiled in (enable the `tls-{other}` feature)"
            )),
        }
    }

    pub fn backend(&self) -> TlsBackend {
        match self {
            #[cfg(feature = "tls-rustls")]
            AnyTlsConnector::Rustls(_) => TlsBackend::Rustls,
            #[cfg(feature = "tls-openssl")]
            AnyTlsConnector::Openssl(_) => TlsBackend::Openssl,
        }
    }
}

#[async_trait]
impl TlsConnector for AnyTlsConnector {
    async fn connect(&self, tcp: TcpStream, server_name: &str) -> io::Result<TlsSocket> {
        match self {
            #[cfg(feature = "tls-rustls")]
            AnyTlsConnector::Rustls(c) => c.connect(tcp, server_name).await,
            #[cfg(feature = "tls-openssl")]
            AnyTlsConnector::Openssl(c) => c.connect(tcp, server_name).await,
        }
    }

    fn default_cipher_suites(&self) -> Vec<String> {
        match self {
            #[cfg(feature = "tls-rustls")]
            AnyTlsConnector::Rustls(c) => c.default_cipher_suites(),
            #[cfg(feature = "tls-openssl")]
            AnyTlsConnector::Openssl(c) => c.default_cipher_suites(),
        }
    }

    fn supported_cipher_suites(&self) -> Vec<String> {
        match self {
            #[cfg(feature = "tls-rustls")]
            AnyTlsConnector::Rustls(c) => c.supported_cipher_suites(),
            #[cfg(feature = "tls-openssl")]
            AnyTlsConnector::Openssl(c) => c.supported_cipher_suites(),
        }
    }
}
