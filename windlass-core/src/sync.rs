// windlass-core/src/sync.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};
use windlass_common::config::Config;
use windlass_common::error::{Result, WindlassError};
use windlass_common::model::CatalogEntry;
use windlass_common::pipeline::PipelineEvent;
use windlass_net::catalog::CatalogClient;

use crate::deleter::DeferredDeletionScheduler;
use crate::install::{InstallReport, Installer};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What a completed run resolved and did.
#[derive(Debug)]
pub struct SyncOutcome {
    pub entries: Vec<CatalogEntry>,
    pub report: InstallReport,
}

/// The pipeline entry point, invoked once per host lifecycle.
///
/// Owns the transfer pool (through the catalog client) and the deferred
/// deletion scheduler for the run; nothing here is ambient global state.
/// `run` fetches the catalog, installs, and publishes
/// [`PipelineEvent::SyncCompleted`] with the resolved entry list. Every
/// event, the completion included, fires on a worker thread, by contract
/// never on the host's primary thread.
///
/// A second `run` on the same instance is rejected: two concurrent runs
/// against one managed directory would race each other on the filesystem,
/// and the single-flight flag is the explicit lock the pipeline takes
/// against its own re-entry. Runs from *separate processes* remain
/// unguarded.
pub struct Synchronizer {
    config: Config,
    client: CatalogClient,
    deleter: Arc<DeferredDeletionScheduler>,
    event_tx: broadcast::Sender<PipelineEvent>,
    ran: AtomicBool,
}

impl Synchronizer {
    pub fn new(config: Config) -> Result<Self> {
        let client = CatalogClient::new(&config)?;
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            config,
            client,
            deleter: Arc::new(DeferredDeletionScheduler::new()),
            event_tx,
            ran: AtomicBool::new(false),
        })
    }

    /// Subscribes to pipeline events. Subscribe before `run`; events
    /// published with no subscriber are dropped, not queued.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// The process-lifetime deletion scheduler. Hosts that shut down
    /// gracefully can call `run_pending` on it as their exit hook; dropping
    /// the synchronizer runs the same pass.
    pub fn deletion_scheduler(&self) -> &Arc<DeferredDeletionScheduler> {
        &self.deleter
    }

    pub async fn run(&self) -> Result<SyncOutcome> {
        if self.ran.swap(true, Ordering::SeqCst) {
            return Err(WindlassError::Generic(
                "synchronization already ran for this host lifecycle".to_string(),
            ));
        }

        self.event_tx
            .send(PipelineEvent::SyncStarted {
                catalog_url: self.config.catalog_url.to_string(),
            })
            .ok();

        let entries = match self.client.fetch_catalog(&self.config.catalog_url).await {
            Ok(entries) => entries,
            Err(e) => {
                // catalog-level failure: nothing trustworthy to iterate over
                error!("Catalog fetch failed, aborting run: {}", e);
                self.event_tx.send(PipelineEvent::sync_aborted(&e)).ok();
                return Err(e);
            }
        };
        self.event_tx
            .send(PipelineEvent::CatalogFetched {
                entry_count: entries.len(),
            })
            .ok();

        let installer = Installer::new(
            self.config.clone(),
            self.client.clone(),
            Arc::clone(&self.deleter),
            self.event_tx.clone(),
        );
        let report = match installer.install_or_update(&entries).await {
            Ok(report) => report,
            Err(e) => {
                error!("Install phase could not start: {}", e);
                self.event_tx.send(PipelineEvent::sync_aborted(&e)).ok();
                return Err(e);
            }
        };

        info!(
            "Synchronization finished: {} installed, {} up to date, {} failed",
            report.installed.len(),
            report.up_to_date.len(),
            report.failed.len()
        );
        self.event_tx
            .send(PipelineEvent::SyncCompleted {
                entries: entries.clone(),
            })
            .ok();

        Ok(SyncOutcome { entries, report })
    }

    /// Runs the pipeline on the given runtime without blocking the caller.
    /// This is the startup-trigger form: the host's lifecycle hook calls it
    /// once and returns immediately; completion arrives as an event.
    pub fn run_detached(self: Arc<Self>, handle: &Handle) -> JoinHandle<Result<SyncOutcome>> {
        handle.spawn(async move { self.run().await })
    }
}
