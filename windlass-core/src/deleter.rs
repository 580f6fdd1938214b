// windlass-core/src/deleter.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, io};

use tracing::{debug, warn};

/// Result of asking the scheduler to remove a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The file is gone (removed now, or it was already absent).
    Deleted,
    /// The immediate delete failed, typically because the host still holds
    /// the file open; the path is now owned by the scheduler and retried at
    /// teardown. Not an error.
    Deferred,
}

/// Retries deletions that could not happen immediately.
///
/// One instance exists per process, owned by the orchestrator and handed to
/// the installer by reference. Scheduling the same path twice appends to the
/// same retry list; there is never a second retry hook. The retry pass is
/// idempotent: a target that vanished in the meantime counts as success, and
/// running the pass twice is a no-op. Anything still undeletable at process
/// exit stays on disk for the next run to rediscover.
///
/// The scheduler never checks path containment itself: callers guard through
/// [`crate::guard::is_managed`] before scheduling, which keeps the guard and
/// the retry mechanism independently testable.
#[derive(Debug, Default)]
pub struct DeferredDeletionScheduler {
    pending: Mutex<BTreeSet<PathBuf>>,
}

impl DeferredDeletionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to delete `path` now; on failure the path joins the retry
    /// list and the outcome is [`DeletionOutcome::Deferred`].
    pub fn schedule_file_deletion(&self, path: &Path) -> DeletionOutcome {
        match try_remove(path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                DeletionOutcome::Deleted
            }
            Err(e) => {
                warn!(
                    "Could not delete {} now ({}), retrying at teardown",
                    path.display(),
                    e
                );
                self.pending
                    .lock()
                    .expect("deletion retry list poisoned")
                    .insert(path.to_path_buf());
                DeletionOutcome::Deferred
            }
        }
    }

    /// Drops a pending retry. Returns whether the path was pending.
    pub fn cancel(&self, path: &Path) -> bool {
        self.pending
            .lock()
            .expect("deletion retry list poisoned")
            .remove(path)
    }

    pub fn pending(&self) -> Vec<PathBuf> {
        self.pending
            .lock()
            .expect("deletion retry list poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// The teardown pass: retries every pending deletion once.
    ///
    /// Targets that are already gone count as success. Targets that still
    /// cannot be deleted stay in the retry list (a later pass may succeed)
    /// and are returned to the caller as abandoned.
    pub fn run_pending(&self) -> Vec<PathBuf> {
        let snapshot: Vec<PathBuf> = {
            let mut pending = self
                .pending
                .lock()
                .expect("deletion retry list poisoned");
            let drained = pending.iter().cloned().collect();
            pending.clear();
            drained
        };

        let mut abandoned = Vec::new();
        for path in snapshot {
            match try_remove(&path) {
                Ok(()) => debug!("Deferred deletion succeeded for {}", path.display()),
                Err(e) => {
                    warn!(
                        "Deferred deletion failed for {} ({}), leaving file on disk",
                        path.display(),
                        e
                    );
                    self.pending
                        .lock()
                        .expect("deletion retry list poisoned")
                        .insert(path.clone());
                    abandoned.push(path);
                }
            }
        }
        abandoned
    }
}

impl Drop for DeferredDeletionScheduler {
    fn drop(&mut self) {
        let abandoned = self.run_pending();
        if !abandoned.is_empty() {
            warn!(
                "{} file(s) could not be deleted before teardown and remain on disk",
                abandoned.len()
            );
        }
    }
}

/// A missing target is success: some other path already removed it.
fn try_remove(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} already gone, nothing to delete", path.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletable_file_is_removed_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("old.jar");
        fs::write(&target, b"stale").expect("write");

        let scheduler = DeferredDeletionScheduler::new();
        assert_eq!(
            scheduler.schedule_file_deletion(&target),
            DeletionOutcome::Deleted
        );
        assert!(!target.exists());
        // no retry registered for a clean delete
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn already_missing_target_counts_as_deleted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scheduler = DeferredDeletionScheduler::new();
        assert_eq!(
            scheduler.schedule_file_deletion(&dir.path().join("never-existed.jar")),
            DeletionOutcome::Deleted
        );
        assert!(scheduler.pending().is_empty());
    }

    // a directory cannot be removed with remove_file, which stands in for a
    // file the host still holds locked
    fn undeletable_target(dir: &Path) -> PathBuf {
        let target = dir.join("held.jar");
        fs::create_dir(&target).expect("create blocker");
        target
    }

    #[test]
    fn locked_target_is_deferred_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = undeletable_target(dir.path());

        let scheduler = DeferredDeletionScheduler::new();
        assert_eq!(
            scheduler.schedule_file_deletion(&target),
            DeletionOutcome::Deferred
        );
        // scheduling again appends to the same list, no duplicate entry
        assert_eq!(
            scheduler.schedule_file_deletion(&target),
            DeletionOutcome::Deferred
        );
        assert_eq!(scheduler.pending(), vec![target]);
    }

    #[test]
    fn teardown_pass_deletes_once_the_target_unlocks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = undeletable_target(dir.path());

        let scheduler = DeferredDeletionScheduler::new();
        scheduler.schedule_file_deletion(&target);

        // "unlock": replace the blocking directory with a plain file
        fs::remove_dir(&target).expect("remove blocker");
        fs::write(&target, b"stale").expect("write");

        assert!(scheduler.run_pending().is_empty());
        assert!(!target.exists());
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn teardown_pass_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = undeletable_target(dir.path());

        let scheduler = DeferredDeletionScheduler::new();
        scheduler.schedule_file_deletion(&target);

        // target vanishes through some other path before the pass runs
        fs::remove_dir(&target).expect("remove blocker");

        assert!(scheduler.run_pending().is_empty());
        assert!(scheduler.run_pending().is_empty());
    }

    #[test]
    fn still_locked_target_is_abandoned_but_kept_for_retry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = undeletable_target(dir.path());

        let scheduler = DeferredDeletionScheduler::new();
        scheduler.schedule_file_deletion(&target);

        assert_eq!(scheduler.run_pending(), vec![target.clone()]);
        // the path stays pending so a later pass can still succeed
        assert_eq!(scheduler.pending(), vec![target.clone()]);
        assert!(target.exists());
    }

    #[test]
    fn cancel_removes_a_pending_retry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = undeletable_target(dir.path());

        let scheduler = DeferredDeletionScheduler::new();
        scheduler.schedule_file_deletion(&target);
        assert!(scheduler.cancel(&target));
        assert!(!scheduler.cancel(&target));
        assert!(scheduler.pending().is_empty());

        // nothing left for teardown to do
        assert!(scheduler.run_pending().is_empty());
        assert!(target.exists());
        fs::remove_dir(&target).expect("cleanup blocker");
    }
}
