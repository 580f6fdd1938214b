// windlass-core/src/install.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, io};

use tempfile::NamedTempFile;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use windlass_common::config::Config;
use windlass_common::error::{Result, WindlassError};
use windlass_common::model::{is_newer, CatalogEntry, InstalledArtifact};
use windlass_common::pipeline::PipelineEvent;
use windlass_net::catalog::CatalogClient;

use crate::deleter::{DeferredDeletionScheduler, DeletionOutcome};
use crate::guard::is_managed;
use crate::installed::scan_managed_dir;

/// What one `install_or_update` run did, per entry id.
#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub up_to_date: Vec<String>,
    pub failed: Vec<(String, WindlassError)>,
}

impl InstallReport {
    pub fn failure_for(&self, id: &str) -> Option<&WindlassError> {
        self.failed
            .iter()
            .find(|(failed_id, _)| failed_id == id)
            .map(|(_, e)| e)
    }
}

/// Diffs the remote catalog against the managed directory, downloads the
/// winning versions, places them atomically and schedules guarded deletion
/// of superseded files.
pub struct Installer {
    config: Config,
    client: CatalogClient,
    deleter: Arc<DeferredDeletionScheduler>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

struct PlannedInstall {
    entry: CatalogEntry,
    /// Installed files this entry supersedes once placed.
    stale_paths: Vec<PathBuf>,
}

impl Installer {
    pub fn new(
        config: Config,
        client: CatalogClient,
        deleter: Arc<DeferredDeletionScheduler>,
        event_tx: broadcast::Sender<PipelineEvent>,
    ) -> Self {
        Self {
            config,
            client,
            deleter,
            event_tx,
        }
    }

    /// Installs or updates every catalog entry that beats what is on disk.
    ///
    /// Entries are processed independently on the transfer pool; one entry's
    /// download, guard or delete failure is recorded in the report and never
    /// aborts the others. Only a failure to read the managed directory
    /// itself aborts the call, since there is nothing trustworthy to diff
    /// against.
    pub async fn install_or_update(&self, entries: &[CatalogEntry]) -> Result<InstallReport> {
        fs::create_dir_all(self.config.managed_dir()).map_err(|e| {
            WindlassError::IoError(format!(
                "Could not create managed directory {}: {}",
                self.config.managed_dir().display(),
                e
            ))
        })?;
        let installed = scan_managed_dir(self.config.managed_dir(), entries)?;
        let mut report = InstallReport::default();
        let plan = self.plan(entries, &installed, &mut report);

        // Downloads run concurrently, capped by the transfer pool. File
        // mutations inside the managed directory happen below, on this task
        // only.
        let mut downloads: JoinSet<(PlannedInstall, Result<(NamedTempFile, u64)>)> =
            JoinSet::new();
        for planned in plan {
            let client = self.client.clone();
            let event_tx = self.event_tx.clone();
            downloads.spawn(async move {
                let entry = &planned.entry;
                event_tx
                    .send(PipelineEvent::DownloadStarted {
                        id: entry.id.clone(),
                        url: entry.download_url.to_string(),
                    })
                    .ok();
                let result = client.download_artifact(entry).await;
                match &result {
                    Ok((temp, size_bytes)) => {
                        event_tx
                            .send(PipelineEvent::DownloadFinished {
                                id: entry.id.clone(),
                                path: temp.path().to_path_buf(),
                                size_bytes: *size_bytes,
                            })
                            .ok();
                    }
                    Err(e) => {
                        event_tx
                            .send(PipelineEvent::download_failed(
                                entry.id.clone(),
                                entry.download_url.to_string(),
                                e,
                            ))
                            .ok();
                    }
                }
                (planned, result)
            });
        }

        while let Some(joined) = downloads.join_next().await {
            let (planned, download_result) = match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    // a panicked download task loses its entry; the report
                    // stays truthful about everything else
                    error!("Download task panicked: {}", join_error);
                    continue;
                }
            };
            let entry = &planned.entry;
            match download_result {
                Ok((temp, _size)) => match self.place_artifact(temp, &entry.file_name) {
                    Ok(final_path) => {
                        debug!(
                            "Installed '{}' {} at {}",
                            entry.id,
                            entry.version,
                            final_path.display()
                        );
                        self.event_tx
                            .send(PipelineEvent::InstallFinished {
                                id: entry.id.clone(),
                                version: entry.version.clone(),
                                path: final_path,
                            })
                            .ok();
                        self.remove_superseded(&planned);
                        report.installed.push(entry.id.clone());
                    }
                    Err(e) => {
                        error!("Could not place '{}' into managed directory: {}", entry.id, e);
                        let failure = WindlassError::installation_failed(entry.id.as_str(), &e);
                        report.failed.push((entry.id.clone(), failure));
                    }
                },
                Err(e) => {
                    warn!(
                        "Download failed for '{}' from {}: {}",
                        entry.id, entry.download_url, e
                    );
                    let failure = WindlassError::installation_failed(entry.id.as_str(), &e);
                    report.failed.push((entry.id.clone(), failure));
                }
            }
        }
        Ok(report)
    }

    /// Picks the entries whose version beats (or is absent from) the
    /// installed set, and collects the files each one supersedes.
    fn plan(
        &self,
        entries: &[CatalogEntry],
        installed: &[InstalledArtifact],
        report: &mut InstallReport,
    ) -> Vec<PlannedInstall> {
        let mut by_id: HashMap<&str, Vec<&InstalledArtifact>> = HashMap::new();
        for artifact in installed {
            by_id.entry(artifact.id.as_str()).or_default().push(artifact);
        }

        let mut plan = Vec::new();
        for entry in entries {
            let existing = by_id.get(entry.id.as_str());
            let current = existing.and_then(|artifacts| {
                artifacts
                    .iter()
                    .find(|a| !is_newer(&entry.version, &a.version))
            });
            if let Some(current) = current {
                debug!(
                    "'{}' already at {} (catalog offers {}), skipping",
                    entry.id, current.version, entry.version
                );
                report.up_to_date.push(entry.id.clone());
                continue;
            }

            let stale_paths = existing
                .map(|artifacts| {
                    artifacts
                        .iter()
                        // same file name means the rename below replaces it
                        .filter(|a| {
                            a.path.file_name().and_then(|n| n.to_str())
                                != Some(entry.file_name.as_str())
                        })
                        .map(|a| a.path.clone())
                        .collect()
                })
                .unwrap_or_default();

            plan.push(PlannedInstall {
                entry: entry.clone(),
                stale_paths,
            });
        }
        plan
    }

    /// Publishes a downloaded payload into the managed directory.
    ///
    /// The payload is first copied to a hidden staging name inside the
    /// managed directory (the temp file may live on another filesystem,
    /// where a direct rename cannot be atomic), then renamed onto its final
    /// name. The rename is the only mutation visible to the host; a failure
    /// at any point leaves no file at the final path.
    fn place_artifact(&self, temp: NamedTempFile, file_name: &str) -> Result<PathBuf> {
        let staging = self.config.staging_path(file_name);
        let final_path = self.config.artifact_path(file_name);

        if let Err(e) = fs::copy(temp.path(), &staging) {
            // an interrupted copy may have left a partial staging file
            discard_staging(&staging);
            return Err(WindlassError::IoError(format!(
                "Failed to stage download at {}: {}",
                staging.display(),
                e
            )));
        }
        if let Err(e) = fs::rename(&staging, &final_path) {
            discard_staging(&staging);
            return Err(WindlassError::IoError(format!(
                "Failed to move staged file {} to {}: {}",
                staging.display(),
                final_path.display(),
                e
            )));
        }
        Ok(final_path)
    }

    /// Hands each superseded file to the deletion scheduler, guarded.
    ///
    /// A refused path is left in place and reported; it is never
    /// force-deleted. A locked path transitions to the scheduler's retry
    /// list. Neither counts against the entry's success.
    fn remove_superseded(&self, planned: &PlannedInstall) {
        for stale in &planned.stale_paths {
            match is_managed(self.config.managed_dir(), stale) {
                Ok(true) => {
                    if self.deleter.schedule_file_deletion(stale) == DeletionOutcome::Deferred {
                        self.event_tx
                            .send(PipelineEvent::DeletionDeferred {
                                path: stale.clone(),
                            })
                            .ok();
                    }
                }
                Ok(false) => {
                    warn!(
                        "Refusing to delete {}: resolves outside the managed directory",
                        stale.display()
                    );
                    self.event_tx
                        .send(PipelineEvent::DeletionRefused {
                            path: stale.clone(),
                        })
                        .ok();
                }
                Err(e) => {
                    warn!(
                        "Could not guard-check {}, leaving file in place: {}",
                        stale.display(),
                        e
                    );
                    self.event_tx
                        .send(PipelineEvent::DeletionRefused {
                            path: stale.clone(),
                        })
                        .ok();
                }
            }
        }
    }
}

/// Best-effort removal of a staging file after a failed publish. A staging
/// name that was never created reports NotFound, which is fine.
fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_file(staging) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(
                "Could not remove staging file {}: {}",
                staging.display(),
                e
            );
        }
    }
}
