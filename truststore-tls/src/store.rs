//! Trust store loading.
//!
//! A trust store is read once, from a file, into a list of DER encoded
//! anchors. Which parser runs is decided by [`StoreType`]:
//!
//! - `JKS` / `JCEKS` — Java keystores, see [`jks`];
//! - `PKCS12` — password protected bags, parsed with OpenSSL (`tls-openssl`);
//! - `PEM` — one or more `CERTIFICATE` blocks;
//! - `DER` — a single certificate.
//!
//! The password only matters for the keystore formats. A JKS store loaded
//! without a password is read without checking its integrity digest.
//!
//! Every anchor must decode as an X.509 certificate; a store that fails this
//! is rejected while loading, before any TLS context is built.

pub mod jks;
#[cfg(feature = "tls-openssl")]
pub mod pkcs12;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use rustls_pki_types::CertificateDer;
use secrecy::SecretString;
use tracing::{debug, warn};
use x509_parser::parse_x509_certificate;

use crate::error::{TrustStoreError, TrustStoreResult};
use crate::{format_error, unsupported_error};

/// Store type used when the configuration does not name one.
pub const DEFAULT_STORE_TYPE: StoreType = StoreType::Jks;

/// Supported trust store formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreType {
    Jks,
    Jceks,
    Pkcs12,
    Pem,
    Der,
}

impl StoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreType::Jks => "JKS",
            StoreType::Jceks => "JCEKS",
            StoreType::Pkcs12 => "PKCS12",
            StoreType::Pem => "PEM",
            StoreType::Der => "DER",
        }
    }

    /// Resolve an optional type name, falling back to [`DEFAULT_STORE_TYPE`].
    pub fn resolve(name: Option<&str>) -> TrustStoreResult<Self> {
        match name {
            Some(n) => n.parse(),
            None => Ok(DEFAULT_STORE_TYPE),
        }
    }

    fn uses_password(self) -> bool {
        matches!(self, StoreType::Jks | StoreType::Jceks | StoreType::Pkcs12)
    }
}

impl fmt::Display for StoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreType {
    type Err = TrustStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JKS" => Ok(StoreType::Jks),
            "JCEKS" => Ok(StoreType::Jceks),
            "PKCS12" | "P12" | "PFX" => Ok(StoreType::Pkcs12),
            "PEM" => Ok(StoreType::Pem),
            "DER" => Ok(StoreType::Der),
            _ => Err(unsupported_error!("{} KeyStore not available", s.trim())),
        }
    }
}

/// Anchors parsed from a trust store file.
#[derive(Debug, Clone)]
pub struct TrustStore {
    store_type: StoreType,
    anchors: Vec<CertificateDer<'static>>,
}

impl TrustStore {
    /// Read and parse the store at `path`.
    ///
    /// Fails with [`TrustStoreError::Config`] when the file cannot be read and
    /// with [`TrustStoreError::Format`] when its content does not parse as
    /// `store_type` or the password does not match.
    pub fn load(
        path: &Path,
        password: Option<&SecretString>,
        store_type: StoreType,
    ) -> TrustStoreResult<Self> {
        debug!(path = %path.display(), %store_type, "loading trust store");

        let file = File::open(path).map_err(|e| TrustStoreError::unreadable(path, e))?;
        let mut bytes = Vec::new();
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .map_err(|e| TrustStoreError::unreadable(path, e))?;

        let store = Self::from_bytes(&bytes, password, store_type)?;
        if store.anchors.is_empty() {
            warn!(
                path = %path.display(),
                "trust store holds no certificates; every handshake will fail"
            );
        } else {
            debug!(anchors = store.anchors.len(), "trust store loaded");
        }
        Ok(store)
    }

    /// Parse an in-memory store.
    pub fn from_bytes(
        bytes: &[u8],
        password: Option<&SecretString>,
        store_type: StoreType,
    ) -> TrustStoreResult<Self> {
        if password.is_some() && !store_type.uses_password() {
            debug!(%store_type, "password ignored for this store type");
        }

        let anchors = match store_type {
            StoreType::Jks | StoreType::Jceks => jks::read_anchors(bytes, password, store_type)?,
            StoreType::Pkcs12 => read_pkcs12(bytes, password)?,
            StoreType::Pem => read_pem(bytes)?,
            StoreType::Der => read_der(bytes)?,
        };
        for (i, anchor) in anchors.iter().enumerate() {
            check_certificate(i, anchor)?;
        }

        Ok(Self {
            store_type,
            anchors,
        })
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type
    }

    pub fn anchors(&self) -> &[CertificateDer<'static>] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(feature = "tls-openssl")]
fn read_pkcs12(
    bytes: &[u8],
    password: Option<&SecretString>,
) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    pkcs12::read_anchors(bytes, password)
}

#[cfg(not(feature = "tls-openssl"))]
fn read_pkcs12(
    _bytes: &[u8],
    _password: Option<&SecretString>,
) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    Err(unsupported_error!(
        "PKCS12 KeyStore not available (build with the `tls-openssl` feature)"
    ))
}

fn check_certificate(index: usize, der: &CertificateDer<'_>) -> TrustStoreResult<()> {
    let (rest, _) = parse_x509_certificate(der)
        .map_err(|e| format_error!("trust anchor #{index} is not a usable certificate: {e}"))?;
    if !rest.is_empty() {
        return Err(format_error!(
            "trust anchor #{index} has {} trailing bytes after the certificate",
            rest.len()
        ));
    }
    Ok(())
}

fn read_pem(bytes: &[u8]) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut &bytes[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format_error!("failed to parse PEM trust store: {e}"))?;
    if certs.is_empty() {
        return Err(format_error!("PEM trust store has no CERTIFICATE blocks"));
    }
    Ok(certs)
}

fn read_der(bytes: &[u8]) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    // X.509 certificates are an ASN.1 SEQUENCE
    if bytes.len() < 2 || bytes[0] != 0x30 {
        return Err(format_error!("DER trust store is not an X.509 certificate"));
    }
    Ok(vec![CertificateDer::from(bytes.to_vec())])
}
