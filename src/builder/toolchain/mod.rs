//! Toolchain description for mixed C/Fortran package builds.
//!
//! The probe turns raw facts reported by a [`ToolchainQuery`] into a
//! validated [`ToolchainProfile`]. Everything downstream copies values out of
//! the profile verbatim and never asks the compilers anything itself.
//!
//! Toolchain detection priority:
//! 1. Config file (`[toolchain]` in `.berth/config.toml` or `~/.berth/config.toml`)
//! 2. Environment variables (CC, FC, AR, RANLIB, CFLAGS, FFLAGS)
//! 3. Auto-detection (searching PATH for common compilers)

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

mod detect;
mod probe;

pub(crate) use detect::contains_symbol;
pub use detect::SystemToolchainQuery;
pub use probe::{sanitize_flags, ProbeError, ToolchainProbe};

/// How the Fortran compiler decorates external symbol names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManglingScheme {
    /// `foo_bar` → `foo_bar__` (g77 style, second underscore on names with one)
    DoubleUnderscore,
    /// `foo` → `foo_`
    Underscore,
    /// `foo` → `FOO`
    Uppercase,
    /// `foo` → `foo`
    None,
}

impl ManglingScheme {
    /// Preprocessor define that tells C sources how to call Fortran.
    pub fn define_token(&self) -> &'static str {
        match self {
            ManglingScheme::DoubleUnderscore => "-DAdd__",
            ManglingScheme::Underscore => "-DAdd_",
            ManglingScheme::Uppercase => "-DUPPER",
            ManglingScheme::None => "-DNoChange",
        }
    }

    /// Map a reported mangling name to a scheme.
    ///
    /// Accepts the names used by common configure systems; anything else
    /// (e.g. `stdcall`) is unsupported.
    pub fn from_report(report: &str) -> Option<Self> {
        match report.trim().to_ascii_lowercase().as_str() {
            "double-underscore" | "doubleunderscore" | "add__" => {
                Some(ManglingScheme::DoubleUnderscore)
            }
            "underscore" | "single-underscore" | "add_" => Some(ManglingScheme::Underscore),
            "caps" | "uppercase" | "upper" => Some(ManglingScheme::Uppercase),
            "unchanged" | "none" | "nochange" => Some(ManglingScheme::None),
            _ => None,
        }
    }

    /// Canonical report name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ManglingScheme::DoubleUnderscore => "double-underscore",
            ManglingScheme::Underscore => "underscore",
            ManglingScheme::Uppercase => "caps",
            ManglingScheme::None => "unchanged",
        }
    }
}

impl fmt::Display for ManglingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw, unvalidated answers from a toolchain query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainFacts {
    /// C compiler
    pub cc: PathBuf,
    /// First line of `cc --version`, if available
    pub cc_identity: Option<String>,
    /// C compiler flags, unsanitized
    pub cflags: Vec<String>,
    /// Whether the C compiler honours `-DNAME`
    pub c_accepts_defines: bool,

    /// Fortran compiler, if any
    pub fc: Option<PathBuf>,
    /// First line of `fc --version`, if available
    pub fc_identity: Option<String>,
    /// Fortran compiler flags, unsanitized
    pub fflags: Vec<String>,
    /// Whether the Fortran compiler accepts free-form Fortran 90
    pub fortran_is_f90: bool,
    /// Prefix that passes a preprocessor define to the Fortran compiler
    pub fortran_define_option: Option<String>,
    /// Reported name mangling, as a free-form string
    pub mangling: String,

    /// Archiver
    pub ar: PathBuf,
    /// Archiver flags
    pub ar_flags: String,
    /// Static archive suffix, without the dot
    pub ar_suffix: String,
    /// Ranlib command
    pub ranlib: String,
}

/// Source of toolchain facts.
pub trait ToolchainQuery {
    /// Ask the active toolchain about itself.
    fn query(&self) -> anyhow::Result<ToolchainFacts>;
}

/// Validated toolchain, ready to be copied into a build-control file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainProfile {
    pub cc: String,
    pub cc_identity: Option<String>,
    /// Sanitized C flags
    pub cflags: String,
    pub fc: String,
    pub fc_identity: Option<String>,
    /// Sanitized Fortran flags
    pub fflags: String,
    pub fortran_define_option: String,
    pub ar: String,
    pub ar_flags: String,
    pub ar_suffix: String,
    pub ranlib: String,
    pub mangling: ManglingScheme,
    pub fortran_is_f90: bool,
    pub c_accepts_defines: bool,
}

/// Flags known to break external package builds.
///
/// Matching is per whitespace-separated token, so `-Wall` is removed while
/// `-Wall-extra-thing` or `-Wshadow=local` survive untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDenylist {
    /// Denied C flags
    pub c: Vec<String>,
    /// Denied Fortran flags
    pub fortran: Vec<String>,
}

impl Default for FlagDenylist {
    fn default() -> Self {
        FlagDenylist {
            c: vec!["-Wall".to_string(), "-Wshadow".to_string()],
            fortran: vec![
                "-Wall".to_string(),
                "-Wshadow".to_string(),
                "-Mfree".to_string(),
            ],
        }
    }
}
