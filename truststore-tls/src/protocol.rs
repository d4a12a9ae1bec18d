//! TLS protocol names accepted by the factory.

use std::fmt;
use std::str::FromStr;

use crate::error::TrustStoreError;
use crate::unsupported_error;

/// Protocol used when the configuration does not name one.
pub const DEFAULT_PROTOCOL: TlsProtocol = TlsProtocol::Tls12;

/// TLS protocol selection, named after the usual `SSLContext` protocol strings.
///
/// | name      | versions offered |
/// |-----------|------------------|
/// | `TLSv1.2` | 1.2              |
/// | `TLSv1.3` | 1.3, 1.2         |
/// | `TLS`     | 1.3, 1.2         |
/// | `SSL`     | same as `TLS`    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsProtocol {
    Tls12,
    Tls13,
    Tls,
}

impl TlsProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            TlsProtocol::Tls12 => "TLSv1.2",
            TlsProtocol::Tls13 => "TLSv1.3",
            TlsProtocol::Tls => "TLS",
        }
    }

    /// Whether a TLS 1.3 handshake may be negotiated.
    pub fn allows_tls13(self) -> bool {
        !matches!(self, TlsProtocol::Tls12)
    }

    /// Resolve an optional protocol name, falling back to [`DEFAULT_PROTOCOL`].
    pub fn resolve(name: Option<&str>) -> Result<Self, TrustStoreError> {
        match name {
            Some(n) => n.parse(),
            None => Ok(DEFAULT_PROTOCOL),
        }
    }
}

impl fmt::Display for TlsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TlsProtocol {
    type Err = TrustStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("TLSv1.2") {
            Ok(TlsProtocol::Tls12)
        } else if name.eq_ignore_ascii_case("TLSv1.3") {
            Ok(TlsProtocol::Tls13)
        } else if name.eq_ignore_ascii_case("TLS") || name.eq_ignore_ascii_case("SSL") {
            Ok(TlsProtocol::Tls)
        } else if ["SSLv2", "SSLv3", "TLSv1", "TLSv1.1"]
            .iter()
            .any(|old| name.eq_ignore_ascii_case(old))
        {
            Err(unsupported_error!(
                "protocol {name} is obsolete and not offered by any provider"
            ))
        } else {
            Err(unsupported_error!("unknown TLS protocol {name:?}"))
        }
    }
}
