// windlass-common/src/lib.rs
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;

// Re-export key types
pub use config::Config;
pub use error::{Result, WindlassError};
pub use model::{CatalogEntry, InstalledArtifact};
pub use pipeline::PipelineEvent;
