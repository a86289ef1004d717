//! Command implementations

pub mod completions;
pub mod config;
pub mod install;
pub mod probe;
pub mod status;

use std::path::Path;

use anyhow::Result;

use berth::builder::{ExecError, ProbeError};
use berth::ops::{RequestError, VerifyError};
use berth::resolver::{DependencyIndex, ResolveError};
use berth::util::diagnostic::{self, Diagnostic, PackageFileError};
use berth::GlobalContext;

/// Typed diagnostic for an orchestration error, if it is one.
pub fn diagnose(err: &anyhow::Error, package: Option<&str>) -> Option<Diagnostic> {
    if let Some(e) = err.downcast_ref::<ResolveError>() {
        return Some(e.to_diagnostic());
    }
    if let Some(e) = err.downcast_ref::<ProbeError>() {
        return Some(e.to_diagnostic());
    }
    if let Some(e) = err.downcast_ref::<RequestError>() {
        return Some(e.to_diagnostic());
    }
    if let Some(e) = err.downcast_ref::<VerifyError>() {
        return Some(e.to_diagnostic());
    }
    match (err.downcast_ref::<ExecError>(), package) {
        (Some(e), Some(package)) => Some(e.to_diagnostic(package)),
        _ => None,
    }
}

/// Print an error, as a diagnostic where one exists.
pub fn report_error(err: &anyhow::Error, color: bool) {
    if let Some(e) = err.downcast_ref::<PackageFileError>() {
        eprint!("{}", e.render());
    } else if let Some(diag) = diagnose(err, None) {
        diagnostic::emit(&diag, color);
    } else {
        eprintln!("error: {:#}", err);
    }
}

/// Load the dependency index, or start from an empty one.
pub fn load_index(ctx: &GlobalContext, path: Option<&Path>) -> Result<DependencyIndex> {
    match path {
        Some(path) => DependencyIndex::load(&ctx.resolve(path)),
        None => {
            tracing::debug!("no dependency index given, starting empty");
            Ok(DependencyIndex::new())
        }
    }
}
