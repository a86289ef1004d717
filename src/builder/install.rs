//! Persisting the outcome of a successful install.
//!
//! Layout under the install prefix:
//!
//! ```text
//! <prefix>/logs/<package>.log     combined output of every build step
//! <prefix>/.berth/<package>.json  fingerprint record
//! ```
//!
//! A record is only ever written after staging succeeded, so its presence
//! means the libraries under the prefix were built from the recorded config.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::builder::executor::BuildReport;
use crate::builder::fingerprint::InstallRecord;
use crate::builder::makeinc::BuildConfig;
use crate::core::{InstallLayout, PackageSpec};
use crate::util::fs::{ensure_dir, remove_file_if_exists, write_string};

/// Reads and writes install records under one prefix.
#[derive(Debug, Clone)]
pub struct InstallRecorder {
    layout: InstallLayout,
}

impl InstallRecorder {
    pub fn new(layout: InstallLayout) -> Self {
        InstallRecorder { layout }
    }

    pub fn layout(&self) -> &InstallLayout {
        &self.layout
    }

    /// Path of a package's fingerprint record.
    pub fn record_path(&self, package: &str) -> PathBuf {
        self.layout.record_dir().join(format!("{}.json", package))
    }

    /// Path of a package's build log.
    pub fn log_path(&self, package: &str) -> PathBuf {
        self.layout.log_dir().join(format!("{}.log", package))
    }

    /// The last successful install of `package`, if any.
    pub fn load(&self, package: &str) -> Result<Option<InstallRecord>> {
        InstallRecord::load(&self.record_path(package))
    }

    /// Write the build log and the fingerprint record.
    pub fn record_success(
        &self,
        spec: &PackageSpec,
        config: &BuildConfig,
        report: &BuildReport,
    ) -> Result<InstallRecord> {
        let log = self.log_path(spec.name());
        ensure_dir(&self.layout.log_dir())?;
        write_string(&log, &report.combined_output())
            .with_context(|| format!("failed to write build log for `{}`", spec.name()))?;

        let record = InstallRecord {
            package: spec.name().to_string(),
            version: spec.version().to_string(),
            fingerprint: config.fingerprint(),
            log,
        };
        ensure_dir(&self.layout.record_dir())?;
        record
            .save(&self.record_path(spec.name()))
            .with_context(|| format!("failed to write install record for `{}`", spec.name()))?;

        tracing::debug!(
            "recorded `{}` with fingerprint {}",
            record.package,
            record.fingerprint
        );
        Ok(record)
    }

    /// Forget a package so the next run rebuilds it.
    pub fn discard(&self, package: &str) -> Result<()> {
        remove_file_if_exists(&self.record_path(package))
    }
}
