// windlass-common/src/model.rs
use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

/// One artifact advertised by the remote catalog manifest.
///
/// Deserialized straight from the manifest's JSON field names; immutable
/// once constructed and only lives for the duration of one orchestration
/// run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Stable identity used to match against installed artifacts.
    pub id: String,
    pub display_name: String,
    pub version: String,
    pub download_url: Url,
    /// The name the artifact file takes inside the managed directory.
    pub file_name: String,
}

/// An artifact inferred to be installed by scanning the managed directory.
///
/// Never persisted: state is always re-derived from disk. That keeps the
/// pipeline ledger-free but is racy against external writers touching the
/// same directory, a known limitation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledArtifact {
    pub id: String,
    pub version: String,
    pub path: PathBuf,
}

/// Compares two version strings, structured-first.
///
/// Both sides parseable as semver are compared semantically; otherwise the
/// comparison falls back to plain lexical order, matching the naive ordering
/// of catalog producers that never adopted semver.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(av), Ok(bv)) => av.cmp(&bv),
        _ => a.cmp(b),
    }
}

/// True when `candidate` should replace `installed`.
pub fn is_newer(candidate: &str, installed: &str) -> bool {
    compare_versions(candidate, installed) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_entry_parses_manifest_field_names() {
        let raw = r#"{
            "id": "gizmo",
            "displayName": "Gizmo",
            "version": "2.1.0",
            "downloadUrl": "https://example.com/files/gizmo-2.1.0.jar",
            "fileName": "gizmo-2.1.0.jar"
        }"#;
        let entry: CatalogEntry = serde_json::from_str(raw).expect("entry should parse");
        assert_eq!(entry.id, "gizmo");
        assert_eq!(entry.display_name, "Gizmo");
        assert_eq!(entry.file_name, "gizmo-2.1.0.jar");
        assert_eq!(entry.download_url.path(), "/files/gizmo-2.1.0.jar");
    }

    #[test]
    fn missing_field_fails_the_entry() {
        let raw = r#"{"id": "gizmo", "version": "2.1.0"}"#;
        assert!(serde_json::from_str::<CatalogEntry>(raw).is_err());
    }

    #[test]
    fn semver_comparison_beats_lexical_order() {
        // lexically "10.0.0" < "9.0.0", semantically it is newer
        assert!(is_newer("10.0.0", "9.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("1.9.0", "2.0.0"));
    }

    #[test]
    fn non_semver_versions_fall_back_to_lexical_order() {
        assert!(is_newer("2.0", "1.0"));
        assert!(is_newer("1.0b", "1.0a"));
        assert!(!is_newer("alpha", "beta"));
    }
}
