//! Trust store configuration.
//!
//! Two ways in:
//!
//! - explicitly, through [`TrustStoreConfig::builder`];
//! - from a [`PropertySource`] via [`TrustStoreConfig::from_properties`], which
//!   reads `<prefix>.trustStore`, `<prefix>.trustStorePassword`,
//!   `<prefix>.trustStoreType`, `<prefix>.sslContextProtocol`,
//!   `<prefix>.tlsBackend` and `<prefix>.includePlatformRoots`.
//!
//! The prefix is [`DEFAULT_PROPERTY_PREFIX`] unless [`PREFIX_PROPERTY`] names
//! another one. [`EnvProperties`] maps those keys onto environment variables
//! (`truststore.tls.trustStore` → `TRUSTSTORE_TLS_TRUSTSTORE`).
//!
//! Store type and protocol stay strings here; they are resolved, in order,
//! when the factory is built.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use tracing::debug;

use crate::connector::TlsBackend;
use crate::error::{TrustStoreError, TrustStoreResult};

/// Prefix used when [`PREFIX_PROPERTY`] is unset.
pub const DEFAULT_PROPERTY_PREFIX: &str = "truststore.tls";
/// Property naming an alternate prefix for every other key.
pub const PREFIX_PROPERTY: &str = "truststore.tls.propertyPrefix";

pub const TRUST_STORE_KEY: &str = "trustStore";
pub const TRUST_STORE_PASSWORD_KEY: &str = "trustStorePassword";
pub const TRUST_STORE_TYPE_KEY: &str = "trustStoreType";
pub const PROTOCOL_KEY: &str = "sslContextProtocol";
pub const BACKEND_KEY: &str = "tlsBackend";
pub const PLATFORM_ROOTS_KEY: &str = "includePlatformRoots";

/// Read-only key/value settings.
pub trait PropertySource {
    fn property(&self, key: &str) -> Option<String>;
}

impl<S: BuildHasher> PropertySource for HashMap<String, String, S> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl PropertySource for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<T: PropertySource + ?Sized> PropertySource for &T {
    fn property(&self, key: &str) -> Option<String> {
        (**self).property(key)
    }
}

/// Properties backed by the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProperties;

impl EnvProperties {
    /// Environment variable that holds `key`.
    pub fn var_name(key: &str) -> String {
        key.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl PropertySource for EnvProperties {
    fn property(&self, key: &str) -> Option<String> {
        std::env::var(Self::var_name(key)).ok()
    }
}

/// Where the trust store lives and how to open it.
#[derive(Debug, Default)]
pub struct TrustStoreConfig {
    path: Option<PathBuf>,
    password: Option<SecretString>,
    store_type: Option<String>,
    protocol: Option<String>,
    backend: Option<TlsBackend>,
    include_platform_roots: bool,
}

impl TrustStoreConfig {
    pub fn builder() -> TrustStoreConfigBuilder {
        TrustStoreConfigBuilder::new()
    }

    /// Store at `path`, all other settings defaulted.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::builder().path(path).build()
    }

    /// Read the configuration from `source`, honouring [`PREFIX_PROPERTY`].
    pub fn from_properties(source: &impl PropertySource) -> TrustStoreResult<Self> {
        let prefix = non_empty(source.property(PREFIX_PROPERTY))
            .unwrap_or_else(|| DEFAULT_PROPERTY_PREFIX.to_string());
        debug!(%prefix, "reading trust store properties");

        let get = |name: &str| non_empty(source.property(&format!("{prefix}.{name}")));

        let mut b = Self::builder();
        if let Some(path) = get(TRUST_STORE_KEY) {
            b = b.path(path);
        }
        if let Some(password) = source.property(&format!("{prefix}.{TRUST_STORE_PASSWORD_KEY}")) {
            b = b.password(password);
        }
        if let Some(store_type) = get(TRUST_STORE_TYPE_KEY) {
            b = b.store_type(store_type);
        }
        if let Some(protocol) = get(PROTOCOL_KEY) {
            b = b.protocol(protocol);
        }
        if let Some(backend) = get(BACKEND_KEY) {
            b = b.backend(backend.parse()?);
        }
        if let Some(flag) = get(PLATFORM_ROOTS_KEY) {
            let yes = match flag.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => true,
                "false" | "no" | "0" => false,
                _ => {
                    return Err(TrustStoreError::config(format!(
                        "{prefix}.{PLATFORM_ROOTS_KEY} must be true or false, got {flag:?}"
                    )));
                }
            };
            b = b.include_platform_roots(yes);
        }
        Ok(b.build())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn password(&self) -> Option<&SecretString> {
        self.password.as_ref()
    }

    pub fn store_type(&self) -> Option<&str> {
        self.store_type.as_deref()
    }

    pub fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    pub fn backend(&self) -> Option<TlsBackend> {
        self.backend
    }

    pub fn include_platform_roots(&self) -> bool {
        self.include_platform_roots
    }
}

#[derive(Debug, Default)]
pub struct TrustStoreConfigBuilder {
    inner: TrustStoreConfig,
}

impl TrustStoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.inner.path = Some(path.into());
        self
    }

    /// Integrity / decryption password. Without one, JKS stores load unchecked.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.inner.password = Some(SecretString::from(password.into()));
        self
    }

    /// Store type name such as `JKS`, `PKCS12` or `PEM`.
    pub fn store_type(mut self, store_type: impl Into<String>) -> Self {
        self.inner.store_type = Some(store_type.into());
        self
    }

    /// Protocol name such as `TLSv1.2`, `TLSv1.3` or `TLS`.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.inner.protocol = Some(protocol.into());
        self
    }

    pub fn backend(mut self, backend: TlsBackend) -> Self {
        self.inner.backend = Some(backend);
        self
    }

    /// Also trust the platform's root certificates.
    pub fn include_platform_roots(mut self, yes: bool) -> Self {
        self.inner.include_platform_roots = yes;
        self
    }

    pub fn build(self) -> TrustStoreConfig {
        self.inner
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
