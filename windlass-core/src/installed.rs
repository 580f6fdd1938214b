// windlass-core/src/installed.rs

use std::fs;
use std::path::Path;

use tracing::{debug, warn};
use windlass_common::error::{Result, WindlassError};
use windlass_common::model::{CatalogEntry, InstalledArtifact};

/// Infers installed artifacts by scanning the managed directory.
///
/// Best-effort and filename-based: a file maps to a catalog id either by
/// matching an entry's exact `file_name` (in which case it carries that
/// entry's version) or by following the `<id>-<version>.<ext>` convention.
/// Files that map to no known id are ignored, as are subdirectories and
/// hidden staging files. There is no persisted version ledger; this scan is
/// the only source of installed-state and is re-run on every orchestration.
pub fn scan_managed_dir(
    managed_dir: &Path,
    known: &[CatalogEntry],
) -> Result<Vec<InstalledArtifact>> {
    let read_dir = fs::read_dir(managed_dir).map_err(|e| {
        WindlassError::IoError(format!(
            "Could not scan managed directory {}: {}",
            managed_dir.display(),
            e
        ))
    })?;

    let mut installed = Vec::new();
    for dir_entry in read_dir {
        let dir_entry = match dir_entry {
            Ok(de) => de,
            Err(e) => {
                warn!(
                    "Skipping unreadable entry in {}: {}",
                    managed_dir.display(),
                    e
                );
                continue;
            }
        };
        let path = dir_entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            // hidden files, including our own staging names
            continue;
        }

        if let Some((id, version)) = map_to_known_id(file_name, known) {
            debug!(
                "Managed directory holds '{}' version '{}' at {}",
                id,
                version,
                path.display()
            );
            installed.push(InstalledArtifact {
                id,
                version,
                path: path.clone(),
            });
        }
    }
    Ok(installed)
}

/// Maps a file name back to a known catalog id.
///
/// Exact `file_name` matches win; otherwise the longest id with an
/// `<id>-<version>` stem wins, so `foo-bar-1.0.jar` prefers id `foo-bar`
/// over id `foo`.
fn map_to_known_id(file_name: &str, known: &[CatalogEntry]) -> Option<(String, String)> {
    if let Some(entry) = known.iter().find(|e| e.file_name == file_name) {
        return Some((entry.id.clone(), entry.version.clone()));
    }

    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .unwrap_or(file_name);

    let mut best: Option<(String, String)> = None;
    for entry in known {
        let version = if stem == entry.id {
            // id with no version suffix: version unknown, treat as stale
            Some(String::new())
        } else {
            stem.strip_prefix(entry.id.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
                .map(|v| v.to_string())
        };
        if let Some(version) = version {
            let longer = best
                .as_ref()
                .is_none_or(|(best_id, _)| entry.id.len() > best_id.len());
            if longer {
                best = Some((entry.id.clone(), version));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use std::fs;

    use url::Url;

    use super::*;

    fn entry(id: &str, version: &str, file_name: &str) -> CatalogEntry {
        CatalogEntry {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            version: version.to_string(),
            download_url: Url::parse("https://example.com/dl").expect("url"),
            file_name: file_name.to_string(),
        }
    }

    #[test]
    fn versioned_file_names_map_back_to_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("gizmo-1.2.0.jar"), b"jar").expect("write");
        let known = vec![entry("gizmo", "2.0.0", "gizmo-2.0.0.jar")];

        let installed = scan_managed_dir(dir.path(), &known).expect("scan");
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].id, "gizmo");
        assert_eq!(installed[0].version, "1.2.0");
    }

    #[test]
    fn exact_catalog_file_name_carries_the_catalog_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("gizmo-2.0.0.jar"), b"jar").expect("write");
        let known = vec![entry("gizmo", "2.0.0", "gizmo-2.0.0.jar")];

        let installed = scan_managed_dir(dir.path(), &known).expect("scan");
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].version, "2.0.0");
    }

    #[test]
    fn longest_id_wins_for_ambiguous_stems() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("foo-bar-1.0.jar"), b"jar").expect("write");
        let known = vec![
            entry("foo", "2.0", "foo-2.0.jar"),
            entry("foo-bar", "2.0", "foo-bar-2.0.jar"),
        ];

        let installed = scan_managed_dir(dir.path(), &known).expect("scan");
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].id, "foo-bar");
        assert_eq!(installed[0].version, "1.0");
    }

    #[test]
    fn unknown_hidden_and_directory_entries_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("unrelated.jar"), b"jar").expect("write");
        fs::write(dir.path().join(".gizmo-1.0.jar.download"), b"partial").expect("write");
        fs::create_dir(dir.path().join("gizmo-1.0.jar.d")).expect("subdir");
        let known = vec![entry("gizmo", "2.0.0", "gizmo-2.0.0.jar")];

        let installed = scan_managed_dir(dir.path(), &known).expect("scan");
        assert!(installed.is_empty());
    }

    #[test]
    fn missing_managed_dir_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gone = dir.path().join("nope");
        assert!(scan_managed_dir(&gone, &[]).is_err());
    }
}
