//! Post-install verification of a package's artifacts.
//!
//! An install counts only if the prefix holds one complete library set, every
//! required header, and every required function in one of the chosen
//! libraries.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::builder::toolchain::contains_symbol;
use crate::core::{DependencyHandle, InstallLayout, PackageSpec};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// What a verified install provides to dependents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedInstall {
    /// Libraries of the first complete alternative, in declared order
    pub libraries: Vec<PathBuf>,
    pub include_dir: PathBuf,
}

impl VerifiedInstall {
    /// Handle under which dependents resolve this package.
    pub fn handle(&self, package: &str) -> DependencyHandle {
        self.libraries.iter().fold(
            DependencyHandle::new(package).with_include(&self.include_dir),
            |handle, lib| handle.with_lib(lib),
        )
    }
}

/// An install that is missing declared artifacts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("no complete library set for `{package}` in {}", dir.display())]
    MissingLibraries {
        package: String,
        dir: PathBuf,
        /// Missing members of the closest alternative
        missing: Vec<String>,
    },

    #[error("header `{header}` of `{package}` is not installed in {}", dir.display())]
    MissingHeader {
        package: String,
        header: String,
        dir: PathBuf,
    },

    #[error("function `{function}` of `{package}` is not exported by the installed libraries")]
    MissingFunction { package: String, function: String },
}

impl VerifyError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        let diag = match self {
            VerifyError::MissingLibraries { missing, dir, .. } => diag
                .with_location(dir)
                .with_context(format!("closest set lacks: {}", missing.join(", "))),
            VerifyError::MissingHeader { dir, .. } => diag.with_location(dir),
            VerifyError::MissingFunction { .. } => diag
                .with_context("the build finished but produced libraries without this symbol"),
        };
        diag.with_suggestion(suggestions::FORCE_REBUILD)
    }
}

/// Check the installed artifacts of `spec` under `layout`.
pub fn verify_install(
    spec: &PackageSpec,
    layout: &InstallLayout,
) -> Result<VerifiedInstall, VerifyError> {
    let lib_dir = layout.lib_dir();
    let include_dir = layout.include_dir();
    let artifacts = &spec.artifacts;

    let libraries = if artifacts.libraries.is_empty() {
        Vec::new()
    } else {
        choose_library_set(spec, &lib_dir)?
    };

    for header in &artifacts.includes {
        if !include_dir.join(header).is_file() {
            return Err(VerifyError::MissingHeader {
                package: spec.name().to_string(),
                header: header.clone(),
                dir: include_dir,
            });
        }
    }

    if !artifacts.functions.is_empty() {
        let contents: Vec<Vec<u8>> = libraries
            .iter()
            .filter_map(|lib| match std::fs::read(lib) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::debug!("cannot read {}: {}", lib.display(), e);
                    None
                }
            })
            .collect();

        for function in &artifacts.functions {
            let found = contents
                .iter()
                .any(|bytes| contains_symbol(bytes, function.as_bytes()));
            if !found {
                return Err(VerifyError::MissingFunction {
                    package: spec.name().to_string(),
                    function: function.clone(),
                });
            }
        }
    }

    tracing::debug!(
        "verified `{}`: {} librar(ies)",
        spec.name(),
        libraries.len()
    );
    Ok(VerifiedInstall {
        libraries,
        include_dir,
    })
}

fn choose_library_set(spec: &PackageSpec, lib_dir: &Path) -> Result<Vec<PathBuf>, VerifyError> {
    let mut closest: Option<Vec<String>> = None;

    for set in &spec.artifacts.libraries {
        let missing: Vec<String> = set
            .iter()
            .filter(|lib| !lib_dir.join(lib).is_file())
            .cloned()
            .collect();

        if missing.is_empty() {
            return Ok(set.iter().map(|lib| lib_dir.join(lib)).collect());
        }
        if closest.as_ref().map_or(true, |c| missing.len() < c.len()) {
            closest = Some(missing);
        }
    }

    Err(VerifyError::MissingLibraries {
        package: spec.name().to_string(),
        dir: lib_dir.to_path_buf(),
        missing: closest.unwrap_or_default(),
    })
}
