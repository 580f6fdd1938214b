// windlass-core/src/guard.rs

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use windlass_common::error::{Result, WindlassError};

/// Checks whether `candidate` is safely contained inside the managed
/// directory `root`.
///
/// Both sides are canonicalized, so `..` components and symlinks cannot
/// smuggle a path outside the root. Every deletion in the pipeline,
/// immediate or deferred, must pass this check in the caller before any
/// filesystem mutation; the result is an explicit `bool`/error so a refusal
/// can never be mistaken for "already deleted".
pub fn is_managed(root: &Path, candidate: &Path) -> Result<bool> {
    let canonical_root = root.canonicalize().map_err(|e| {
        WindlassError::IoError(format!(
            "Could not resolve managed directory {}: {}",
            root.display(),
            e
        ))
    })?;
    let canonical_candidate = canonicalize_candidate(candidate)?;

    let contained = canonical_candidate.starts_with(&canonical_root);
    if !contained {
        debug!(
            "Path {} resolves to {} which is outside {}",
            candidate.display(),
            canonical_candidate.display(),
            canonical_root.display()
        );
    }
    Ok(contained)
}

/// Canonicalizes a deletion candidate. A candidate that no longer exists is
/// resolved through its parent with the file name re-appended, so the
/// containment check still sees through `..` and symlinked ancestors.
fn canonicalize_candidate(candidate: &Path) -> Result<PathBuf> {
    match candidate.canonicalize() {
        Ok(resolved) => Ok(resolved),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let parent = candidate.parent().ok_or_else(|| {
                WindlassError::Generic(format!("Path has no parent: {}", candidate.display()))
            })?;
            let file_name = candidate.file_name().ok_or_else(|| {
                WindlassError::Generic(format!("Path has no file name: {}", candidate.display()))
            })?;
            let resolved_parent = parent.canonicalize().map_err(|parent_err| {
                WindlassError::IoError(format!(
                    "Could not resolve parent of {}: {}",
                    candidate.display(),
                    parent_err
                ))
            })?;
            Ok(resolved_parent.join(file_name))
        }
        Err(e) => Err(e.into()),
    }
}
