// windlass-common/src/pipeline.rs
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::WindlassError;
use crate::model::CatalogEntry;

/// Progress and completion notifications published while a run executes.
///
/// Every event fires on a worker thread, never the host's primary thread;
/// consumers that need host-thread-only state must re-marshal themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    SyncStarted {
        catalog_url: String,
    },
    CatalogFetched {
        entry_count: usize,
    },
    DownloadStarted {
        id: String,
        url: String,
    },
    DownloadFinished {
        id: String,
        path: PathBuf,
        size_bytes: u64,
    },
    DownloadFailed {
        id: String,
        url: String,
        error: String, // Keep as String for simplicity in events
    },
    InstallFinished {
        id: String,
        version: String,
        path: PathBuf,
    },
    /// The guard rejected a stale file's path; the file stays in place.
    DeletionRefused {
        path: PathBuf,
    },
    /// An immediate delete failed (file locked by the host); the path is now
    /// owned by the deferred deletion scheduler. Not a failure.
    DeletionDeferred {
        path: PathBuf,
    },
    /// The completion event: the resolved catalog, delivered once per run.
    SyncCompleted {
        entries: Vec<CatalogEntry>,
    },
    SyncAborted {
        error: String,
    },
}

impl PipelineEvent {
    // WindlassError kept for internal use, but events carry error messages as String
    pub fn download_failed(id: String, url: String, error: &WindlassError) -> Self {
        PipelineEvent::DownloadFailed {
            id,
            url,
            error: error.to_string(),
        }
    }

    pub fn sync_aborted(error: &WindlassError) -> Self {
        PipelineEvent::SyncAborted {
            error: error.to_string(),
        }
    }
}
