#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

pub mod config;
pub mod connector;
pub mod error;
pub mod factory;
pub mod net;
pub mod protocol;
pub mod store;

pub use config::{EnvProperties, PropertySource, TrustStoreConfig, TrustStoreConfigBuilder};
pub use connector::{AnyTlsConnector, TlsBackend, TlsConnector};
pub use error::{TrustStoreError, TrustStoreResult};
pub use factory::{SharedFactory, SocketFactory, TrustStoreSocketFactory, get_default};
pub use net::TlsSocket;
pub use protocol::TlsProtocol;
pub use store::{StoreType, TrustStore};

///Lib version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
