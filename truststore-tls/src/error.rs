//! Error taxonomy for building a trust-store backed socket factory.
//!
//! Every construction failure keeps its classification so callers can tell a
//! misconfigured path from a corrupt store or an unavailable protocol. Errors
//! raised while creating sockets are plain [`std::io::Error`]s coming straight
//! from the TLS backend and are not wrapped here.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Errors raised while loading a trust store or building a TLS context.
#[derive(Error, Debug)]
pub enum TrustStoreError {
    /// The trust store location is missing or the file cannot be read.
    #[error("trust store configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// The file is not a valid store of the declared type, or the password is wrong.
    #[error("trust store format error: {0}")]
    Format(String),

    /// The store type or TLS protocol is not offered by the compiled-in providers.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The TLS context could not be initialised.
    #[error("TLS context initialisation failed: {0}")]
    CryptoInit(String),
}

impl TrustStoreError {
    /// Configuration error without an underlying cause.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// The trust store file at `path` could not be opened or read.
    pub fn unreadable(path: &Path, source: io::Error) -> Self {
        Self::Config {
            message: format!("cannot read trust store {}", path.display()),
            source: Some(source),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(message.into())
    }

    pub fn crypto_init(message: impl Into<String>) -> Self {
        Self::CryptoInit(message.into())
    }

    /// Short classification name, stable across messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "ConfigError",
            Self::Format(_) => "FormatError",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithmError",
            Self::CryptoInit(_) => "CryptoInitError",
        }
    }
}

/// Result of trust store and factory construction.
pub type TrustStoreResult<T> = Result<T, TrustStoreError>;

/// Build a [`TrustStoreError::Format`] from format arguments.
#[macro_export]
macro_rules! format_error {
    ($($arg:tt)*) => {
        $crate::error::TrustStoreError::format(format!($($arg)*))
    };
}

/// Build a [`TrustStoreError::UnsupportedAlgorithm`] from format arguments.
#[macro_export]
macro_rules! unsupported_error {
    ($($arg:tt)*) => {
        $crate::error::TrustStoreError::unsupported(format!($($arg)*))
    };
}
