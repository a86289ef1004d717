//! User-friendly diagnostic messages.
//!
//! Every orchestration error renders with its root cause, the facts that led
//! to it, and concrete next steps. Build failures additionally carry the tail
//! of the captured build output.

use std::fmt;
use std::path::{Path, PathBuf};

use miette::{Diagnostic as MietteDiagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a dependency is missing from the index.
    pub const MISSING_DEPENDENCY: &str =
        "help: Add the dependency to the index passed with `--deps`";

    /// Suggestion when a Fortran 90 compiler is required.
    pub const NEED_F90: &str =
        "help: Install gfortran (or set FC / `[toolchain] fc`) to a Fortran 90 compiler";

    /// Suggestion when the build fails.
    pub const BUILD_FAILED: &str = "help: Run `berth install --verbose` for more details";

    /// Suggestion for a stale or corrupt install record.
    pub const FORCE_REBUILD: &str = "help: Run `berth install --force` to rebuild from scratch";
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
    /// Verbatim output attached to the diagnostic
    pub output: Option<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
            output: None,
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Attach captured tool output.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let label = if color {
            "\x1b[1;31merror\x1b[0m"
        } else {
            "error"
        };

        output.push_str(&format!("{}: {}\n", label, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if let Some(ref captured) = self.output {
            output.push_str("\n--- captured output ---\n");
            output.push_str(captured);
            if !captured.ends_with('\n') {
                output.push('\n');
            }
            output.push_str("--- end of output ---\n");
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Syntax or schema error in a package file, pointing at the offending span.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("invalid package file `{path}`: {reason}")]
#[diagnostic(
    code(berth::package::parse),
    help("See the `[package]`, `[artifacts]` and `[dependencies]` tables of a working package file")
)]
pub struct PackageFileError {
    pub path: String,
    pub reason: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl PackageFileError {
    /// Wrap a TOML error with the file it came from.
    pub fn from_toml(path: &Path, contents: &str, err: &toml::de::Error) -> Self {
        let path = path.display().to_string();
        PackageFileError {
            reason: err.message().to_string(),
            src: NamedSource::new(path.clone(), contents.to_string()),
            span: err.span().map(SourceSpan::from),
            path,
        }
    }

    /// Render with source excerpt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if GraphicalReportHandler::new()
            .render_report(&mut out, self)
            .is_err()
        {
            return self.to_string();
        }
        out
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
