//! Implementation of `berth install`.
//!
//! One install runs the components in a fixed order:
//!
//! ```text
//! resolve -> probe -> generate -> detect changes -> (skip | build -> verify -> record)
//! ```
//!
//! Every failure before the build leaves the install prefix untouched. A
//! failed build removes the previous record so the next run retries.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use thiserror::Error;

use crate::builder::executor::{BuildExecutor, BuildReport, MakeInvocation, ProcessRunner};
use crate::builder::fingerprint::{ChangeDetector, Freshness, InstallRecord};
use crate::builder::install::InstallRecorder;
use crate::builder::makeinc::{generate, BuildConfig, MAKEINC_FILE};
use crate::builder::stage::ArtifactStager;
use crate::builder::toolchain::{FlagDenylist, ToolchainProbe, ToolchainProfile, ToolchainQuery};
use crate::core::package::{COMPLEX_OPTION, INDEX64_OPTION};
use crate::core::{DependencyHandle, FeatureSet, InstallLayout, PackageSpec};
use crate::ops::verify::{verify_install, VerifiedInstall};
use crate::resolver::{DependencyResolver, DependencySource};
use crate::util::config::Config;
use crate::util::diagnostic::Diagnostic;

/// Settings shared by every install of one invocation.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub layout: InstallLayout,
    pub make: MakeInvocation,
    pub timeout: Duration,
    pub denylist: FlagDenylist,
}

impl OrchestratorConfig {
    /// Derive from the merged configuration; a relative prefix is taken
    /// relative to `base`.
    pub fn from_config(config: &Config, base: &Path) -> Self {
        OrchestratorConfig {
            layout: config.layout(base),
            make: MakeInvocation::from_config(config),
            timeout: config.step_timeout(),
            denylist: config.denylist(),
        }
    }
}

/// One package to install.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub spec: PackageSpec,
    /// Unpacked source tree the native build runs in
    pub source_dir: PathBuf,
    pub features: FeatureSet,
    /// Rebuild even when the record is fresh
    pub force: bool,
}

impl InstallRequest {
    /// Load a package file and apply option overrides.
    ///
    /// The source tree is `[package] source` relative to the package file,
    /// or the package file's own directory.
    pub fn load(path: &Path, with: &[String], without: &[String], force: bool) -> Result<Self> {
        let spec = PackageSpec::load(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let source_dir = match spec.package.source {
            Some(ref source) => base.join(source),
            None => base.to_path_buf(),
        };
        let features = FeatureSet::from_spec(&spec).with_overrides(
            with.iter().map(String::as_str),
            without.iter().map(String::as_str),
        );

        Ok(InstallRequest {
            spec,
            source_dir,
            features,
            force,
        })
    }
}

/// Request the package itself cannot satisfy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("`{package}` does not support 64-bit integer indices")]
    Index64Unsupported { package: String },

    #[error("`{package}` cannot be built for complex scalars")]
    ComplexUnsupported { package: String },
}

impl RequestError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            RequestError::Index64Unsupported { package } => Diagnostic::error(self.to_string())
                .with_context(format!("option `{}` is enabled", INDEX64_OPTION))
                .with_suggestion(format!(
                    "Build `{}` with 32-bit indices: `--without {}`",
                    package, INDEX64_OPTION
                )),
            RequestError::ComplexUnsupported { package } => Diagnostic::error(self.to_string())
                .with_context(format!("option `{}` is enabled", COMPLEX_OPTION))
                .with_suggestion(format!(
                    "Build `{}` for real scalars: `--without {}`",
                    package, COMPLEX_OPTION
                )),
        }
    }
}

/// What an install run did.
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    /// Built, verified and recorded
    Installed {
        record: InstallRecord,
        report: BuildReport,
        verified: VerifiedInstall,
        freshness: Freshness,
    },
    /// Record matched the generated config; nothing ran
    UpToDate {
        record: InstallRecord,
        verified: VerifiedInstall,
    },
}

impl InstallOutcome {
    pub fn record(&self) -> &InstallRecord {
        match self {
            InstallOutcome::Installed { record, .. } | InstallOutcome::UpToDate { record, .. } => {
                record
            }
        }
    }

    pub fn was_built(&self) -> bool {
        matches!(self, InstallOutcome::Installed { .. })
    }

    /// Handle under which dependents resolve the installed package.
    pub fn handle(&self) -> DependencyHandle {
        let verified = match self {
            InstallOutcome::Installed { verified, .. }
            | InstallOutcome::UpToDate { verified, .. } => verified,
        };
        verified.handle(&self.record().package)
    }
}

/// Drives installs through the collaborators.
///
/// The toolchain is probed at most once per orchestrator.
pub struct Orchestrator<'a> {
    config: &'a OrchestratorConfig,
    toolchain: &'a dyn ToolchainQuery,
    runner: &'a dyn ProcessRunner,
    stager: &'a dyn ArtifactStager,
    profile: RefCell<Option<ToolchainProfile>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a OrchestratorConfig,
        toolchain: &'a dyn ToolchainQuery,
        runner: &'a dyn ProcessRunner,
        stager: &'a dyn ArtifactStager,
    ) -> Self {
        Orchestrator {
            config,
            toolchain,
            runner,
            stager,
            profile: RefCell::new(None),
        }
    }

    pub fn recorder(&self) -> InstallRecorder {
        InstallRecorder::new(self.config.layout.clone())
    }

    /// Probe the toolchain, reusing an earlier result.
    pub fn profile(&self) -> Result<ToolchainProfile> {
        if let Some(ref profile) = *self.profile.borrow() {
            return Ok(profile.clone());
        }

        let profile = ToolchainProbe::new(self.toolchain, &self.config.denylist).probe()?;
        *self.profile.borrow_mut() = Some(profile.clone());
        Ok(profile)
    }

    /// Resolve, probe and generate, without touching the filesystem.
    pub fn plan(&self, deps: &dyn DependencySource, request: &InstallRequest) -> Result<BuildConfig> {
        let spec = &request.spec;

        if request.features.is_enabled(INDEX64_OPTION) && !spec.package.index64 {
            return Err(RequestError::Index64Unsupported {
                package: spec.name().to_string(),
            }
            .into());
        }
        if request.features.is_enabled(COMPLEX_OPTION) && !spec.package.complex {
            return Err(RequestError::ComplexUnsupported {
                package: spec.name().to_string(),
            }
            .into());
        }

        let resolved = DependencyResolver::new(deps).resolve(spec, &request.features)?;
        let profile = self.profile()?;
        Ok(generate(&profile, &resolved, &request.features))
    }

    /// Install one package.
    pub fn install(
        &self,
        deps: &dyn DependencySource,
        request: &InstallRequest,
    ) -> Result<InstallOutcome> {
        let spec = &request.spec;
        let name = spec.name();
        tracing::info!("installing `{}` {}", name, spec.version());

        let config = self.plan(deps, request)?;

        if !request.source_dir.is_dir() {
            bail!(
                "source directory for `{}` not found: {} (fetch and unpack the package first)",
                name,
                request.source_dir.display()
            );
        }
        let makeinc = request.source_dir.join(MAKEINC_FILE);
        config
            .write_to(&makeinc)
            .with_context(|| format!("failed to write {}", makeinc.display()))?;

        let recorder = self.recorder();
        let previous = match recorder.load(name) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("ignoring install record of `{}`: {:#}", name, e);
                None
            }
        };

        let freshness =
            ChangeDetector::check(&config, previous.as_ref().map(|r| r.fingerprint.as_str()));

        if let (Freshness::Fresh, Some(record), false) = (&freshness, &previous, request.force) {
            match verify_install(spec, &self.config.layout) {
                Ok(verified) => {
                    tracing::info!("`{}` is up to date", name);
                    return Ok(InstallOutcome::UpToDate {
                        record: record.clone(),
                        verified,
                    });
                }
                Err(e) => tracing::warn!("rebuilding `{}`: {}", name, e),
            }
        }

        match freshness {
            Freshness::Missing => tracing::info!("`{}` has not been built here", name),
            Freshness::Stale { .. } => {
                tracing::info!("{} of `{}` changed, rebuilding", MAKEINC_FILE, name)
            }
            Freshness::Fresh => tracing::info!("rebuilding `{}`", name),
        }

        recorder.discard(name)?;

        let mut executor = BuildExecutor::new(
            self.runner,
            self.stager,
            self.config.make.clone(),
            self.config.timeout,
        );
        let report = executor.execute(&request.source_dir, &self.config.layout)?;

        let verified = verify_install(spec, &self.config.layout)?;
        let record = recorder.record_success(spec, &config, &report)?;
        tracing::info!("installed `{}` into {}", name, self.config.layout.prefix().display());

        Ok(InstallOutcome::Installed {
            record,
            report,
            verified,
            freshness,
        })
    }
}
