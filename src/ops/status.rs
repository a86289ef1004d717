//! Implementation of `berth status`.

use std::fmt::Write as _;

use anyhow::Result;
use url::Url;

use crate::builder::fingerprint::InstallRecord;
use crate::builder::install::InstallRecorder;
use crate::core::PackageSpec;
use crate::ops::verify::verify_install;
use crate::util::hash::short;

/// Install state of one package under one prefix.
#[derive(Debug, Clone)]
pub struct PackageStatus {
    pub name: String,
    pub version: String,
    pub download: Vec<Url>,
    pub record: Option<InstallRecord>,
    /// Why the installed artifacts are incomplete, if they are
    pub problem: Option<String>,
}

impl PackageStatus {
    pub fn is_installed(&self) -> bool {
        self.record.is_some() && self.problem.is_none()
    }
}

/// Inspect the record and artifacts of `spec`.
pub fn status(spec: &PackageSpec, recorder: &InstallRecorder) -> Result<PackageStatus> {
    let (record, problem) = match recorder.load(spec.name()) {
        Ok(Some(record)) => {
            let problem = verify_install(spec, recorder.layout())
                .err()
                .map(|e| e.to_string());
            (Some(record), problem)
        }
        Ok(None) => (None, None),
        Err(e) => {
            tracing::warn!("{:#}", e);
            (None, Some(format!("{:#}", e)))
        }
    };

    Ok(PackageStatus {
        name: spec.name().to_string(),
        version: spec.version().to_string(),
        download: spec.package.download.clone(),
        record,
        problem,
    })
}

/// Format a status for terminal output.
pub fn format_status(status: &PackageStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", status.name, status.version);

    match status.record {
        Some(ref record) => {
            let _ = writeln!(out, "  installed:   yes (version {})", record.version);
            let _ = writeln!(out, "  fingerprint: {}", short(&record.fingerprint));
            let _ = writeln!(out, "  log:         {}", record.log.display());
        }
        None => {
            let _ = writeln!(out, "  installed:   no");
        }
    }

    if let Some(ref problem) = status.problem {
        let _ = writeln!(out, "  problem:     {}", problem);
    }

    for url in &status.download {
        let _ = writeln!(out, "  download:    {}", url);
    }

    out
}
