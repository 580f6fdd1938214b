// windlass-net/src/lib.rs
pub mod catalog;
pub mod http;
pub mod pool;

// Re-export the public fetching surface
pub use catalog::CatalogClient;
pub use http::{build_http_client, RedirectingConnector};
pub use pool::TransferPool;
pub use windlass_common::{
    error::{Result, WindlassError},
    model::CatalogEntry,
    Config,
};
