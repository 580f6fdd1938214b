// windlass-core/src/lib.rs

// Declare the top-level modules within the library crate
pub mod deleter;
pub mod guard;
pub mod install;
pub mod installed;
pub mod sync;

// Re-export key types for embedding hosts
pub use deleter::{DeferredDeletionScheduler, DeletionOutcome};
pub use guard::is_managed;
pub use install::{InstallReport, Installer};
pub use installed::scan_managed_dir;
pub use sync::{SyncOutcome, Synchronizer};
pub use windlass_common::{
    error::{Result, WindlassError},
    model::{CatalogEntry, InstalledArtifact},
    pipeline::PipelineEvent,
    Config,
};
