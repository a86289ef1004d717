//! Capability checks and flag sanitization.

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

use super::{FlagDenylist, ManglingScheme, ToolchainFacts, ToolchainProfile, ToolchainQuery};

/// Error while probing the toolchain.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("toolchain cannot build this package: {reason}")]
    ToolchainCapability { reason: String },

    #[error("unsupported Fortran name mangling `{reported}`")]
    UnsupportedMangling { reported: String },

    #[error("failed to query toolchain: {0}")]
    Query(String),
}

impl ProbeError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ProbeError::ToolchainCapability { reason } => {
                let diag = Diagnostic::error("toolchain is missing a required capability")
                    .with_context(reason.clone());
                if reason.contains("Fortran 90") {
                    diag.with_suggestion(suggestions::NEED_F90)
                } else {
                    diag.with_suggestion("Point `[toolchain]` in .berth/config.toml at a different compiler")
                }
            }
            ProbeError::UnsupportedMangling { reported } => Diagnostic::error(format!(
                "Fortran compiler uses an unsupported name mangling (`{}`)",
                reported
            ))
            .with_context("supported: double-underscore, underscore, caps, unchanged")
            .with_suggestion("Use a Fortran compiler with a conventional mangling (e.g. gfortran)"),
            ProbeError::Query(message) => Diagnostic::error("failed to query the toolchain")
                .with_context(message.clone())
                .with_suggestion("Set CC and FC explicitly"),
        }
    }
}

/// Turns toolchain facts into a validated profile.
pub struct ToolchainProbe<'a> {
    query: &'a dyn ToolchainQuery,
    denylist: &'a FlagDenylist,
}

impl<'a> ToolchainProbe<'a> {
    pub fn new(query: &'a dyn ToolchainQuery, denylist: &'a FlagDenylist) -> Self {
        ToolchainProbe { query, denylist }
    }

    /// Query the toolchain and validate it.
    ///
    /// Hard prerequisites are checked before anything else is derived.
    pub fn probe(&self) -> Result<ToolchainProfile, ProbeError> {
        let facts = self
            .query
            .query()
            .map_err(|e| ProbeError::Query(format!("{:#}", e)))?;

        let (fc, define_option) = check_capabilities(&facts)?;

        let mangling = ManglingScheme::from_report(&facts.mangling).ok_or_else(|| {
            ProbeError::UnsupportedMangling {
                reported: facts.mangling.clone(),
            }
        })?;

        let profile = ToolchainProfile {
            cc: facts.cc.display().to_string(),
            cc_identity: facts.cc_identity.clone(),
            cflags: sanitize_flags(&facts.cflags, &self.denylist.c),
            fc,
            fc_identity: facts.fc_identity.clone(),
            fflags: sanitize_flags(&facts.fflags, &self.denylist.fortran),
            fortran_define_option: define_option,
            ar: facts.ar.display().to_string(),
            ar_flags: facts.ar_flags.clone(),
            ar_suffix: facts.ar_suffix.trim_start_matches('.').to_string(),
            ranlib: facts.ranlib.clone(),
            mangling,
            fortran_is_f90: facts.fortran_is_f90,
            c_accepts_defines: facts.c_accepts_defines,
        };

        tracing::debug!(
            "toolchain: cc={} fc={} mangling={}",
            profile.cc,
            profile.fc,
            profile.mangling
        );
        Ok(profile)
    }
}

fn check_capabilities(facts: &ToolchainFacts) -> Result<(String, String), ProbeError> {
    let capability = |reason: &str| ProbeError::ToolchainCapability {
        reason: reason.to_string(),
    };

    let fc = facts
        .fc
        .as_ref()
        .ok_or_else(|| capability("no Fortran compiler found; a Fortran 90 compiler is required"))?;

    if !facts.fortran_is_f90 {
        return Err(ProbeError::ToolchainCapability {
            reason: format!("{} is not a Fortran 90 compiler", fc.display()),
        });
    }

    if !facts.c_accepts_defines {
        return Err(ProbeError::ToolchainCapability {
            reason: format!(
                "C compiler {} cannot take preprocessor defines on the command line",
                facts.cc.display()
            ),
        });
    }

    let define_option = facts
        .fortran_define_option
        .clone()
        .filter(|opt| !opt.trim().is_empty())
        .ok_or_else(|| ProbeError::ToolchainCapability {
            reason: format!(
                "Fortran compiler {} cannot take preprocessor defines on the command line",
                fc.display()
            ),
        })?;

    Ok((fc.display().to_string(), define_option))
}

/// Drop denied flags, keeping the order of the rest.
pub fn sanitize_flags(flags: &[String], deny: &[String]) -> String {
    retained_flags(flags, deny).collect::<Vec<_>>().join(" ")
}

/// Whitespace-separated flag tokens that survive the denylist.
pub(crate) fn retained_flags<'a>(
    flags: &'a [String],
    deny: &'a [String],
) -> impl Iterator<Item = &'a str> + 'a {
    flags
        .iter()
        .flat_map(|f| f.split_whitespace())
        .filter(move |f| !deny.iter().any(|d| d == f))
}
