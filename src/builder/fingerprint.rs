//! Rebuild detection for generated build-control files.
//!
//! A package is rebuilt only when the fingerprint of its freshly generated
//! build-control file differs from the one recorded by the last successful
//! install. Re-running with an unchanged toolchain and dependency set is a
//! no-op.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::makeinc::BuildConfig;

/// What a successful install leaves behind for the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    /// Package name
    pub package: String,

    /// Package version
    pub version: String,

    /// SHA-256 of the build-control file the install was built from
    pub fingerprint: String,

    /// Combined build log
    pub log: PathBuf,
}

impl InstallRecord {
    /// Load a record; a missing file means "never installed".
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read install record: {}", path.display()))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("corrupt install record: {}", path.display()))?;
        Ok(Some(record))
    }

    /// Save the record as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        crate::util::fs::write_string(path, &content)
    }
}

/// Freshness of a generated config against the recorded install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    /// Nothing was ever recorded
    Missing,
    /// Recorded fingerprint differs
    Stale { previous: String, current: String },
    /// Recorded fingerprint matches
    Fresh,
}

impl Freshness {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Freshness::Fresh)
    }
}

/// Decides whether a package must be rebuilt.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Compare a generated config against a previously recorded fingerprint.
    pub fn check(config: &BuildConfig, previous: Option<&str>) -> Freshness {
        let current = config.fingerprint();
        match previous {
            None => Freshness::Missing,
            Some(prev) if prev == current => Freshness::Fresh,
            Some(prev) => Freshness::Stale {
                previous: prev.to_string(),
                current,
            },
        }
    }

    /// Whether a rebuild is needed.
    pub fn rebuild_needed(config: &BuildConfig, previous: Option<&str>) -> bool {
        Self::check(config, previous).needs_rebuild()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::makeinc::generate;
    use crate::core::{DependencyHandle, FeatureSet, ResolvedDeps};
    use crate::test_support::fixtures::{gnu_profile, mumps_deps};
    use tempfile::TempDir;

    #[test]
    fn test_first_run_then_unchanged() {
        let cfg = generate(&gnu_profile(), &mumps_deps(false), &FeatureSet::default());

        assert!(ChangeDetector::rebuild_needed(&cfg, None));
        assert_eq!(ChangeDetector::check(&cfg, None), Freshness::Missing);

        let recorded = cfg.fingerprint();
        let again = generate(&gnu_profile(), &mumps_deps(false), &FeatureSet::default());
        assert!(!ChangeDetector::rebuild_needed(&again, Some(&recorded)));
    }

    #[test]
    fn test_changed_dependency_path_triggers_rebuild() {
        let features = FeatureSet::default();
        let cfg = generate(&gnu_profile(), &mumps_deps(false), &features);
        let recorded = cfg.fingerprint();

        let moved: Vec<DependencyHandle> = mumps_deps(false)
            .iter()
            .cloned()
            .map(|h| {
                if h.name == "mpi" {
                    DependencyHandle::new("mpi")
                        .with_include("/opt/mpich/include")
                        .with_lib("/opt/mpich/lib/libmpi.so")
                } else {
                    h
                }
            })
            .collect();
        let changed = generate(&gnu_profile(), &ResolvedDeps::new(moved), &features);

        match ChangeDetector::check(&changed, Some(&recorded)) {
            Freshness::Stale { previous, current } => {
                assert_eq!(previous, recorded);
                assert_ne!(current, recorded);
            }
            other => panic!("expected stale, got {:?}", other),
        }
    }

    #[test]
    fn test_record_roundtrip_and_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".berth").join("mumps.json");

        assert_eq!(InstallRecord::load(&path).unwrap(), None);

        let record = InstallRecord {
            package: "mumps".to_string(),
            version: "4.10.0".to_string(),
            fingerprint: "abc".to_string(),
            log: tmp.path().join("logs/mumps.log"),
        };
        record.save(&path).unwrap();

        assert_eq!(InstallRecord::load(&path).unwrap(), Some(record));
    }

    #[test]
    fn test_corrupt_record_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mumps.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = InstallRecord::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("corrupt install record"));
    }
}
