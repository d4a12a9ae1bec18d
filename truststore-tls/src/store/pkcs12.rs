//! PKCS#12 trust stores, parsed with OpenSSL.

use openssl::pkcs12::Pkcs12;
use rustls_pki_types::CertificateDer;
use secrecy::{ExposeSecret, SecretString};

use crate::error::TrustStoreResult;
use crate::format_error;

/// Certificates of the bag: the end-entity certificate (if any) followed by
/// the CA certificates. A missing password is tried as the empty password.
pub fn read_anchors(
    bytes: &[u8],
    password: Option<&SecretString>,
) -> TrustStoreResult<Vec<CertificateDer<'static>>> {
    let bag = Pkcs12::from_der(bytes).map_err(|e| format_error!("invalid PKCS12 store: {e}"))?;
    let pass = password.map(|p| p.expose_secret()).unwrap_or("");
    let parsed = bag.parse2(pass).map_err(|e| {
        format_error!("PKCS12 store password was incorrect or the store is corrupt: {e}")
    })?;

    let mut anchors = Vec::new();
    if let Some(cert) = parsed.cert {
        let der = cert
            .to_der()
            .map_err(|e| format_error!("cannot encode PKCS12 certificate: {e}"))?;
        anchors.push(CertificateDer::from(der));
    }
    for ca in parsed.ca.into_iter().flatten() {
        let der = ca
            .to_der()
            .map_err(|e| format_error!("cannot encode PKCS12 CA certificate: {e}"))?;
        anchors.push(CertificateDer::from(der));
    }
    Ok(anchors)
}
