//! TLS client context built on **rustls** (0.23) + **tokio-rustls**.
//!
//! - The root store holds exactly the trust store's anchors, plus the
//!   platform roots from `rustls-native-certs` when asked for.
//! - `TLSv1.2` pins the handshake to TLS 1.2; `TLSv1.3` and `TLS` allow 1.3
//!   and 1.2.
//! - Exactly one crypto provider feature must be enabled:
//!   `tls-rustls-ring` **or** `tls-rustls-aws-lc`.

use std::fmt;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector as TokioTlsConnector;
use tracing::{debug, warn};

use rustls::client::ClientConfig;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use rustls::{RootCertStore, SupportedCipherSuite, SupportedProtocolVersion};

use super::{ContextConfig, TlsConnector};
use crate::error::TrustStoreResult;
use crate::net::TlsSocket;
use crate::protocol::TlsProtocol;
use crate::{format_error, unsupported_error};

/// Compile-time guard: make sure exactly one provider feature is enabled.
#[cfg(all(not(feature = "tls-rustls-ring"), not(feature = "tls-rustls-aws-lc")))]
compile_error!("Enable exactly one provider feature: `tls-rustls-ring` OR `tls-rustls-aws-lc`.");
#[cfg(all(feature = "tls-rustls-ring", feature = "tls-rustls-aws-lc"))]
compile_error!(
    "Enable exactly one provider feature: `tls-rustls-ring` OR `tls-rustls-aws-lc` (not both)."
);

static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];

/// A built rustls client context.
#[derive(Clone)]
pub struct RustlsConnector {
    inner: TokioTlsConnector,
    protocol: TlsProtocol,
    default_suites: Vec<String>,
    supported_suites: Vec<String>,
}

impl fmt::Debug for RustlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsConnector")
            .field("protocol", &self.protocol)
            .field("default_suites", &self.default_suites.len())
            .finish_non_exhaustive()
    }
}

impl RustlsConnector {
    /// Build the root store and the client config.
    pub fn new(cfg: ContextConfig<'_>) -> TrustStoreResult<Self> {
        let provider = crypto_provider();

        let mut roots = RootCertStore::empty();
        if cfg.include_platform_roots {
            let native = rustls_native_certs::load_native_certs();
            for err in &native.errors {
                warn!("skipping platform root: {err}");
            }
            let (added, ignored) = roots.add_parsable_certificates(native.certs);
            debug!(added, ignored, "platform roots added");
        }
        for (i, anchor) in cfg.anchors.iter().enumerate() {
            roots
                .add(anchor.clone())
                .map_err(|e| format_error!("trust anchor #{i} is not a usable certificate: {e}"))?;
        }
        if roots.is_empty() {
            warn!("root store is empty; no server certificate will verify");
        }

        let versions = protocol_versions(cfg.protocol);
        let client = ClientConfig::builder_with_provider(provider.clone())
            .with_protocol_versions(versions)
            .map_err(|e| {
                unsupported_error!("{} not available from the crypto provider: {e}", cfg.protocol)
            })?
            .with_root_certificates(roots)
            .with_no_client_auth();

        let supported_suites = provider.cipher_suites.iter().map(suite_name).collect();
        let default_suites = provider
            .cipher_suites
            .iter()
            .filter(|s| versions.iter().any(|v| v.version == s.version().version))
            .map(suite_name)
            .collect();

        debug!(protocol = %cfg.protocol, "rustls client context ready");
        Ok(Self {
            inner: TokioTlsConnector::from(Arc::new(client)),
            protocol: cfg.protocol,
            default_suites,
            supported_suites,
        })
    }
}

#[async_trait]
impl TlsConnector for RustlsConnector {
    async fn connect(&self, tcp: TcpStream, server_name: &str) -> io::Result<TlsSocket> {
        let name = ServerName::try_from(server_name.to_string()).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid server name {server_name:?}: {e}"),
            )
        })?;
        let tls = self.inner.connect(name, tcp).await?;
        Ok(TlsSocket::Rustls { inner: tls })
    }

    fn default_cipher_suites(&self) -> Vec<String> {
        self.default_suites.clone()
    }

    fn supported_cipher_suites(&self) -> Vec<String> {
        self.supported_suites.clone()
    }
}

fn protocol_versions(protocol: TlsProtocol) -> &'static [&'static SupportedProtocolVersion] {
    if protocol.allows_tls13() {
        rustls::ALL_VERSIONS
    } else {
        TLS12_ONLY
    }
}

fn suite_name(suite: &SupportedCipherSuite) -> String {
    format!("{:?}", suite.suite())
}

#[cfg(feature = "tls-rustls-ring")]
fn crypto_provider() -> Arc<CryptoProvider> {
    rustls::crypto::ring::default_provider().into()
}

#[cfg(all(feature = "tls-rustls-aws-lc", not(feature = "tls-rustls-ring")))]
fn crypto_provider() -> Arc<CryptoProvider> {
    rustls::crypto::aws_lc_rs::default_provider().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(protocol: TlsProtocol) -> RustlsConnector {
        let ca = rcgen::generate_simple_self_signed(vec!["ca.test".into()]).unwrap();
        let anchors = [ca.cert.der().clone()];
        RustlsConnector::new(ContextConfig {
            anchors: &anchors,
            protocol,
            include_platform_roots: false,
        })
        .unwrap()
    }

    #[test]
    fn tls12_context_enables_no_tls13_suites() {
        let c = connector(TlsProtocol::Tls12);
        let defaults = c.default_cipher_suites();
        assert!(!defaults.is_empty());
        assert!(defaults.iter().all(|s| !s.starts_with("TLS13_")), "{defaults:?}");
        assert!(c.supported_cipher_suites().iter().any(|s| s.starts_with("TLS13_")));
    }

    #[test]
    fn tls13_context_enables_everything() {
        let c = connector(TlsProtocol::Tls13);
        assert_eq!(c.default_cipher_suites(), c.supported_cipher_suites());
    }

    #[test]
    fn garbage_anchor_is_format_error() {
        let junk = [rustls::pki_types::CertificateDer::from(vec![0x30, 0x00])];
        let err = RustlsConnector::new(ContextConfig {
            anchors: &junk,
            protocol: TlsProtocol::Tls12,
            include_platform_roots: false,
        })
        .unwrap_err();
        assert!(matches!(err, crate::error::TrustStoreError::Format(_)), "{err}");
    }
}
