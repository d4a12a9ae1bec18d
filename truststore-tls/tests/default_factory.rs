mod common;

use std::sync::Arc;

use tempfile::TempDir;
use truststore_tls::{EnvProperties, TrustStoreError, TrustStoreSocketFactory, get_default};

use common::{Pki, init_tracing, write_store};

const VARS: &[&str] = &[
    "truststore.tls.propertyPrefix",
    "truststore.tls.trustStore",
    "truststore.tls.trustStorePassword",
    "truststore.tls.trustStoreType",
    "truststore.tls.sslContextProtocol",
    "truststore.tls.tlsBackend",
    "truststore.tls.includePlatformRoots",
];

// The only test in this binary: it owns the process environment.
#[test]
fn default_factory_comes_from_the_environment() {
    init_tracing();
    for key in VARS {
        // SAFETY: no other thread touches the environment in this binary.
        unsafe { std::env::remove_var(EnvProperties::var_name(key)) };
    }

    let err = get_default().unwrap_err();
    assert!(matches!(err, TrustStoreError::Config { .. }), "{err}");

    let pki = Pki::new("default factory CA");
    let dir = TempDir::new().unwrap();
    let path = write_store(dir.path(), "ca.pem", pki.ca_pem.as_bytes());
    // SAFETY: as above.
    unsafe {
        std::env::set_var("TRUSTSTORE_TLS_TRUSTSTORE", &path);
        std::env::set_var("TRUSTSTORE_TLS_TRUSTSTORETYPE", "PEM");
        std::env::set_var("TRUSTSTORE_TLS_SSLCONTEXTPROTOCOL", "TLSv1.3");
    }

    let first = get_default().unwrap();
    assert_eq!(first.protocol().as_str(), "TLSv1.3");
    assert_eq!(first.anchor_count(), 1);

    // later changes do not rebuild the shared instance
    // SAFETY: as above.
    unsafe { std::env::set_var("TRUSTSTORE_TLS_SSLCONTEXTPROTOCOL", "nonsense") };
    let second = TrustStoreSocketFactory::get_default().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}
