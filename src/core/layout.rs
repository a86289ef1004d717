//! Install prefix layout.

use std::path::{Path, PathBuf};

/// Where a package's artifacts, logs and install records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    prefix: PathBuf,
    libdir: String,
    includedir: String,
}

impl InstallLayout {
    /// Create a layout with `lib` and `include` subdirectories.
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        InstallLayout {
            prefix: prefix.into(),
            libdir: "lib".to_string(),
            includedir: "include".to_string(),
        }
    }

    /// Override the library subdirectory.
    pub fn with_libdir(mut self, libdir: impl Into<String>) -> Self {
        self.libdir = libdir.into();
        self
    }

    /// Override the header subdirectory.
    pub fn with_includedir(mut self, includedir: impl Into<String>) -> Self {
        self.includedir = includedir.into();
        self
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join(&self.libdir)
    }

    pub fn include_dir(&self) -> PathBuf {
        self.prefix.join(&self.includedir)
    }

    /// Directory holding install records.
    pub fn record_dir(&self) -> PathBuf {
        self.prefix.join(".berth")
    }

    /// Directory holding captured build logs.
    pub fn log_dir(&self) -> PathBuf {
        self.prefix.join("logs")
    }
}
