//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during dependency resolution.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("`{package}` requires `{dependency}`, which has not been resolved")]
    MissingDependency {
        package: String,
        dependency: String,
        /// Option that pulled the dependency in, for feature-gated ones
        feature: Option<String>,
    },
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::MissingDependency {
                package,
                dependency,
                feature,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "could not resolve dependency `{}` of `{}`",
                    dependency, package
                ));

                match feature {
                    Some(feature) => {
                        diag = diag
                            .with_context(format!("required because option `{}` is enabled", feature))
                            .with_suggestion(format!("Disable it with `--without {}`", feature));
                    }
                    None => {
                        diag = diag.with_context(format!(
                            "`{}` lists `{}` as a required dependency",
                            package, dependency
                        ));
                    }
                }

                diag.with_suggestion(format!("Install `{}` first", dependency))
                    .with_suggestion(suggestions::MISSING_DEPENDENCY)
            }
        }
    }
}
