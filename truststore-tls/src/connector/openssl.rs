//! TLS client context built on **OpenSSL** + `tokio-openssl`.
//!
//! The verify store is replaced by one holding only the trust store's anchors
//! (plus the default OpenSSL paths when platform roots are requested). Cipher
//! configuration is left at the library defaults.
//!
//! OpenSSL has no getter for a context's cipher list, so the enabled suites
//! are read back from a ClientHello written into memory, and the supported
//! suites are every code point the library can decode.

use std::fmt;
use std::io::{self, Read, Write};
use std::pin::Pin;

use async_trait::async_trait;
use openssl::ssl::{
    HandshakeError, Ssl, SslCipherRef, SslConnector, SslMethod, SslRef, SslVerifyMode, SslVersion,
};
use openssl::x509::X509;
use openssl::x509::store::X509StoreBuilder;
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::{debug, warn};

use super::{ContextConfig, TlsConnector};
use crate::error::{TrustStoreError, TrustStoreResult};
use crate::net::TlsSocket;
use crate::protocol::TlsProtocol;
use crate::{format_error, unsupported_error};

/// A built OpenSSL client context.
#[derive(Clone)]
pub struct OpensslConnector {
    inner: SslConnector,
    protocol: TlsProtocol,
    default_suites: Vec<String>,
    supported_suites: Vec<String>,
}

impl fmt::Debug for OpensslConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpensslConnector")
            .field("protocol", &self.protocol)
            .field("default_suites", &self.default_suites.len())
            .finish_non_exhaustive()
    }
}

impl OpensslConnector {
    pub fn new(cfg: ContextConfig<'_>) -> TrustStoreResult<Self> {
        let init = |e: openssl::error::ErrorStack| TrustStoreError::crypto_init(e.to_string());

        let mut b = SslConnector::builder(SslMethod::tls_client()).map_err(init)?;

        let max = if cfg.protocol.allows_tls13() {
            SslVersion::TLS1_3
        } else {
            SslVersion::TLS1_2
        };
        b.set_min_proto_version(Some(SslVersion::TLS1_2))
            .and_then(|_| b.set_max_proto_version(Some(max)))
            .map_err(|e| unsupported_error!("{} not available from OpenSSL: {e}", cfg.protocol))?;

        let mut store = X509StoreBuilder::new().map_err(init)?;
        if cfg.include_platform_roots {
            store.set_default_paths().map_err(init)?;
        }
        for (i, anchor) in cfg.anchors.iter().enumerate() {
            let cert = X509::from_der(anchor)
                .map_err(|e| format_error!("trust anchor #{i} is not a usable certificate: {e}"))?;
            store
                .add_cert(cert)
                .map_err(|e| format_error!("trust anchor #{i} rejected: {e}"))?;
        }
        if cfg.anchors.is_empty() && !cfg.include_platform_roots {
            warn!("verify store is empty; no server certificate will verify");
        }
        b.set_cert_store(store.build());
        b.set_verify(SslVerifyMode::PEER);

        let inner = b.build();
        let (default_suites, supported_suites) = cipher_suites(&inner)?;

        debug!(
            protocol = %cfg.protocol,
            suites = default_suites.len(),
            "openssl client context ready"
        );
        Ok(Self {
            inner,
            protocol: cfg.protocol,
            default_suites,
            supported_suites,
        })
    }
}

/// Sink for the first flight of a handshake that never gets an answer.
#[derive(Debug, Default)]
struct HelloCapture {
    written: Vec<u8>,
}

impl Read for HelloCapture {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }
}

impl Write for HelloCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// (enabled, supported) suite names for a built context.
fn cipher_suites(connector: &SslConnector) -> TrustStoreResult<(Vec<String>, Vec<String>)> {
    let init = |e: openssl::error::ErrorStack| TrustStoreError::crypto_init(e.to_string());

    let mut ssl = Ssl::new(connector.context()).map_err(init)?;
    ssl.set_connect_state();
    let mid = match ssl.connect(HelloCapture::default()) {
        Err(HandshakeError::WouldBlock(mid)) => mid,
        Err(HandshakeError::SetupFailure(e)) => return Err(init(e)),
        Err(e) => {
            return Err(TrustStoreError::crypto_init(format!(
                "cannot produce a ClientHello: {e}"
            )));
        }
        Ok(_) => {
            return Err(TrustStoreError::crypto_init(
                "handshake completed without a peer",
            ));
        }
    };

    let offered = offered_suites(&mid.get_ref().written).ok_or_else(|| {
        TrustStoreError::crypto_init("OpenSSL wrote an unexpected ClientHello")
    })?;
    let enabled = decode_suites(mid.ssl(), offered)?;

    let every_code: Vec<u8> = (0..=u16::MAX).flat_map(u16::to_be_bytes).collect();
    let supported = decode_suites(mid.ssl(), &every_code)?;
    Ok((enabled, supported))
}

fn decode_suites(ssl: &SslRef, wire: &[u8]) -> TrustStoreResult<Vec<String>> {
    let lists = ssl
        .bytes_to_cipher_list(wire, false)
        .map_err(|e| TrustStoreError::crypto_init(e.to_string()))?;
    Ok(lists.suites.iter().map(suite_name).collect())
}

fn suite_name(cipher: &SslCipherRef) -> String {
    cipher.standard_name().unwrap_or(cipher.name()).to_string()
}

/// The cipher_suites field of a ClientHello record.
fn offered_suites(record: &[u8]) -> Option<&[u8]> {
    // record header, handshake header, client_version, random
    const FIXED: usize = 5 + 4 + 2 + 32;
    if record.first() != Some(&0x16) || record.get(5) != Some(&0x01) {
        return None;
    }
    let body = record.get(FIXED..)?;
    let session_id = *body.first()? as usize;
    let rest = body.get(1 + session_id..)?;
    let len = u16::from_be_bytes([*rest.first()?, *rest.get(1)?]) as usize;
    rest.get(2..2 + len)
}

#[async_trait]
impl TlsConnector for OpensslConnector {
    async fn connect(&self, tcp: TcpStream, server_name: &str) -> io::Result<TlsSocket> {
        let ssl = self
            .inner
            .configure()
            .and_then(|c| c.into_ssl(server_name))
            .map_err(io::Error::other)?;
        let mut stream = SslStream::new(ssl, tcp).map_err(io::Error::other)?;
        Pin::new(&mut stream)
            .connect()
            .await
            .map_err(|e| e.into_io_error().unwrap_or_else(io::Error::other))?;
        Ok(TlsSocket::Openssl { inner: stream })
    }

    fn default_cipher_suites(&self) -> Vec<String> {
        self.default_suites.clone()
    }

    fn supported_cipher_suites(&self) -> Vec<String> {
        self.supported_suites.clone()
    }
}
