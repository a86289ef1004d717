//! Configuration file support for Berth.
//!
//! Berth reads two configuration file locations:
//! - Global: `~/.berth/config.toml` - User-wide defaults
//! - Project: `.berth/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. The merged value is
//! handed to each orchestration explicitly; nothing here is process-global.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::toolchain::FlagDenylist;
use crate::core::InstallLayout;

/// Upper bound for a single external build step.
///
/// Large Fortran libraries legitimately compile for tens of minutes; the
/// bound only exists to catch hung builds.
pub const DEFAULT_STEP_TIMEOUT_SECS: u64 = 2500;

/// Berth configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildSettings,

    /// Toolchain overrides
    pub toolchain: ToolchainSettings,

    /// Compiler flag sanitization
    pub sanitize: SanitizeSettings,

    /// Install locations
    pub install: InstallSettings,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Per-step timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Make program (default: `make`)
    pub make: Option<String>,

    /// Parallel make jobs (None = serial, the native makefiles are not all -j safe)
    pub jobs: Option<usize>,

    /// Target used for the best-effort clean step
    pub clean_target: Option<String>,

    /// Target that builds every library
    pub build_target: Option<String>,
}

/// Toolchain settings for C/Fortran compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Path to the C compiler
    pub cc: Option<PathBuf>,

    /// Path to the Fortran compiler
    pub fc: Option<PathBuf>,

    /// Path to the archiver
    pub ar: Option<PathBuf>,

    /// Archiver flags (default: `cr`)
    pub ar_flags: Option<String>,

    /// Static archive suffix without the dot (default: `a`)
    pub ar_suffix: Option<String>,

    /// Path to ranlib
    pub ranlib: Option<PathBuf>,

    /// C compiler flags (replaces CFLAGS)
    pub cflags: Option<Vec<String>>,

    /// Fortran compiler flags (replaces FFLAGS)
    pub fflags: Option<Vec<String>>,
}

/// Flags removed from the toolchain flags before they reach a package build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeSettings {
    /// Denied C flags (replaces the defaults when set)
    pub c_deny: Option<Vec<String>>,

    /// Denied Fortran flags (replaces the defaults when set)
    pub fortran_deny: Option<Vec<String>>,
}

/// Install locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSettings {
    /// Install prefix
    pub prefix: Option<PathBuf>,

    /// Library directory relative to the prefix (default: `lib`)
    pub libdir: Option<String>,

    /// Header directory relative to the prefix (default: `include`)
    pub includedir: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let b = other.build;
        merge_opt(&mut self.build.timeout_secs, b.timeout_secs);
        merge_opt(&mut self.build.make, b.make);
        merge_opt(&mut self.build.jobs, b.jobs);
        merge_opt(&mut self.build.clean_target, b.clean_target);
        merge_opt(&mut self.build.build_target, b.build_target);

        let t = other.toolchain;
        merge_opt(&mut self.toolchain.cc, t.cc);
        merge_opt(&mut self.toolchain.fc, t.fc);
        merge_opt(&mut self.toolchain.ar, t.ar);
        merge_opt(&mut self.toolchain.ar_flags, t.ar_flags);
        merge_opt(&mut self.toolchain.ar_suffix, t.ar_suffix);
        merge_opt(&mut self.toolchain.ranlib, t.ranlib);
        merge_opt(&mut self.toolchain.cflags, t.cflags);
        merge_opt(&mut self.toolchain.fflags, t.fflags);

        merge_opt(&mut self.sanitize.c_deny, other.sanitize.c_deny);
        merge_opt(&mut self.sanitize.fortran_deny, other.sanitize.fortran_deny);

        merge_opt(&mut self.install.prefix, other.install.prefix);
        merge_opt(&mut self.install.libdir, other.install.libdir);
        merge_opt(&mut self.install.includedir, other.install.includedir);
    }

    /// Timeout applied to every external build step.
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.build.timeout_secs.unwrap_or(DEFAULT_STEP_TIMEOUT_SECS))
    }

    /// Make program to drive the native build.
    pub fn make_program(&self) -> &str {
        self.build.make.as_deref().unwrap_or("make")
    }

    /// Flag denylist, with configured lists replacing the defaults.
    pub fn denylist(&self) -> FlagDenylist {
        let mut deny = FlagDenylist::default();
        if let Some(ref c) = self.sanitize.c_deny {
            deny.c = c.clone();
        }
        if let Some(ref f) = self.sanitize.fortran_deny {
            deny.fortran = f.clone();
        }
        deny
    }

    /// Install layout, with a relative prefix resolved against `base`.
    pub fn layout(&self, base: &Path) -> InstallLayout {
        let prefix = match self.install.prefix {
            Some(ref p) if p.is_absolute() => p.clone(),
            Some(ref p) => base.join(p),
            None => base.join("berth-install"),
        };

        InstallLayout::new(prefix)
            .with_libdir(self.install.libdir.as_deref().unwrap_or("lib"))
            .with_includedir(self.install.includedir.as_deref().unwrap_or("include"))
    }
}

fn merge_opt<T>(slot: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *slot = other;
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.berth/config.toml)
/// 2. Global config (~/.berth/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global berth config directory (~/.berth).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".berth"))
}

/// Get the global config path (~/.berth/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.berth/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".berth").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_project_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global.toml");
        let project = tmp.path().join("project.toml");

        std::fs::write(
            &global,
            "[build]\ntimeout_secs = 100\nmake = \"gmake\"\n\n[toolchain]\nfc = \"/opt/bin/ifort\"\n",
        )
        .unwrap();
        std::fs::write(&project, "[build]\ntimeout_secs = 30\n").unwrap();

        let config = load_config(&global, &project);
        assert_eq!(config.step_timeout(), Duration::from_secs(30));
        assert_eq!(config.make_program(), "gmake");
        assert_eq!(config.toolchain.fc, Some(PathBuf::from("/opt/bin/ifort")));
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(
            config.step_timeout(),
            Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS)
        );
        assert_eq!(config.make_program(), "make");
        assert_eq!(config.denylist(), FlagDenylist::default());
    }

    #[test]
    fn test_configured_denylist_replaces_defaults() {
        let config: Config = toml::from_str(
            "[sanitize]\nfortran_deny = [\"-Mfree\", \"-warn\"]\n",
        )
        .unwrap();

        let deny = config.denylist();
        assert_eq!(deny.fortran, vec!["-Mfree", "-warn"]);
        assert_eq!(deny.c, FlagDenylist::default().c);
    }

    #[test]
    fn test_layout_resolves_relative_prefix() {
        let config: Config =
            toml::from_str("[install]\nprefix = \"opt\"\nlibdir = \"lib64\"\n").unwrap();

        let layout = config.layout(Path::new("/work"));
        assert_eq!(layout.prefix(), Path::new("/work/opt"));
        assert_eq!(layout.lib_dir(), PathBuf::from("/work/opt/lib64"));
        assert_eq!(layout.include_dir(), PathBuf::from("/work/opt/include"));
    }
}
