//! Package file parsing and schema.
//!
//! A package file describes one third-party library: where its sources come
//! from, which artifacts a successful install must produce, and which other
//! packages it needs.
//!
//! ```toml
//! [package]
//! name = "mumps"
//! version = "4.10.0"
//! download = ["http://ftp.mcs.anl.gov/pub/petsc/externalpackages/MUMPS_4.10.0-p1.tar.gz"]
//! source = "MUMPS_4.10.0-p1"
//! complex = true
//!
//! [artifacts]
//! libraries = [["libdmumps.a", "libmumps_common.a", "libpord.a"]]
//! functions = ["dmumps_c"]
//! includes = ["dmumps_c.h"]
//!
//! [dependencies]
//! required = ["parmetis", "scalapack", "blacs", "mpi", "blaslapack"]
//! optional = [{ name = "ptscotch", feature = "ptscotch" }]
//!
//! [features]
//! ptscotch = false
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::util::diagnostic::PackageFileError;

/// Option that requests 64-bit integer indices from the package.
pub const INDEX64_OPTION: &str = "index64";

/// Option that requests a build for complex scalars.
pub const COMPLEX_OPTION: &str = "complex";

/// Declarative description of an external package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageSpec {
    /// Identity and source information
    pub package: PackageInfo,

    /// Artifacts a successful install must provide
    #[serde(default)]
    pub artifacts: Artifacts,

    /// Dependencies on other packages
    #[serde(default)]
    pub dependencies: Dependencies,

    /// Default values for boolean options
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
}

/// The `[package]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    /// Package name
    pub name: String,

    /// Package version
    pub version: Version,

    /// Download locations, tried in order by the fetcher
    #[serde(default)]
    pub download: Vec<Url>,

    /// Unpacked source directory, relative to the package file
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Whether the package supports complex scalars
    #[serde(default)]
    pub complex: bool,

    /// Whether the package supports 64-bit integer indices
    #[serde(default)]
    pub index64: bool,
}

/// The `[artifacts]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifacts {
    /// Alternative library sets; any single complete set satisfies the install
    #[serde(default)]
    pub libraries: Vec<Vec<String>>,

    /// Symbols the installed libraries must export
    #[serde(default)]
    pub functions: Vec<String>,

    /// Headers the install must provide
    #[serde(default)]
    pub includes: Vec<String>,
}

/// The `[dependencies]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dependencies {
    /// Always-required dependencies, in declaration order
    #[serde(default)]
    pub required: Vec<String>,

    /// Dependencies pulled in only when their option is enabled
    #[serde(default)]
    pub optional: Vec<OptionalDependency>,
}

/// A feature-gated dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalDependency {
    /// Dependency name
    pub name: String,

    /// Option that enables it (defaults to the dependency name)
    #[serde(default)]
    pub feature: Option<String>,
}

impl OptionalDependency {
    /// Name of the option gating this dependency.
    pub fn feature(&self) -> &str {
        self.feature.as_deref().unwrap_or(&self.name)
    }
}

impl PackageSpec {
    /// Load a package file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read package file: {}", path.display()))?;

        let spec: PackageSpec = toml::from_str(&contents)
            .map_err(|e| PackageFileError::from_toml(path, &contents, &e))?;
        spec.validate()
            .with_context(|| format!("invalid package file: {}", path.display()))?;
        Ok(spec)
    }

    /// Parse and validate package file contents.
    pub fn parse(contents: &str) -> Result<Self> {
        let spec: PackageSpec = toml::from_str(contents)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.package.name
    }

    /// Package version.
    pub fn version(&self) -> &Version {
        &self.package.version
    }

    /// Names of every dependency that could be resolved, required first.
    pub fn all_dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .required
            .iter()
            .map(String::as_str)
            .chain(self.dependencies.optional.iter().map(|d| d.name.as_str()))
    }

    /// Check structural invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.package.name.trim().is_empty() {
            bail!("package name must not be empty");
        }

        let mut seen = BTreeSet::new();
        for name in self.all_dependency_names() {
            if !seen.insert(name) {
                bail!("dependency `{}` is declared more than once", name);
            }
        }

        if self.artifacts.libraries.iter().any(|set| set.is_empty()) {
            bail!("library alternatives must not contain an empty set");
        }

        Ok(())
    }
}

/// Effective boolean options for one orchestration run.
///
/// An option that was never mentioned is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureSet {
    values: BTreeMap<String, bool>,
}

impl FeatureSet {
    /// Start from the package file defaults.
    pub fn from_spec(spec: &PackageSpec) -> Self {
        FeatureSet {
            values: spec.features.clone(),
        }
    }

    /// Enable an option.
    pub fn enable(mut self, name: impl Into<String>) -> Self {
        self.values.insert(name.into(), true);
        self
    }

    /// Disable an option.
    pub fn disable(mut self, name: impl Into<String>) -> Self {
        self.values.insert(name.into(), false);
        self
    }

    /// Apply `--with` / `--without` overrides; `without` wins on conflict.
    pub fn with_overrides<'a>(
        mut self,
        with: impl IntoIterator<Item = &'a str>,
        without: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        for name in with {
            self = self.enable(name);
        }
        for name in without {
            self = self.disable(name);
        }
        self
    }

    /// Whether an option is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.values.get(name).copied().unwrap_or(false)
    }

    /// Enabled option names, sorted.
    pub fn enabled(&self) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(|(_, on)| **on)
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUMPS: &str = r#"
[package]
name = "mumps"
version = "4.10.0"
download = ["http://ftp.mcs.anl.gov/pub/petsc/externalpackages/MUMPS_4.10.0-p1.tar.gz"]
complex = true

[artifacts]
libraries = [
  ["libcmumps.a", "libdmumps.a", "libmumps_common.a", "libpord.a"],
  ["libcmumps.a", "libdmumps.a", "libmumps_common.a", "libpord.a", "libpthread.a"],
]
functions = ["dmumps_c"]
includes = ["dmumps_c.h"]

[dependencies]
required = ["parmetis", "scalapack", "blacs", "mpi", "blaslapack"]
optional = [{ name = "ptscotch" }]
"#;

    #[test]
    fn test_parse_package() {
        let spec = PackageSpec::parse(MUMPS).unwrap();

        assert_eq!(spec.name(), "mumps");
        assert_eq!(spec.version(), &Version::new(4, 10, 0));
        assert_eq!(spec.package.download.len(), 1);
        assert!(spec.package.complex);
        assert!(!spec.package.index64);
        assert_eq!(spec.artifacts.libraries.len(), 2);
        assert_eq!(spec.dependencies.optional[0].feature(), "ptscotch");
        assert_eq!(
            spec.all_dependency_names().collect::<Vec<_>>(),
            vec!["parmetis", "scalapack", "blacs", "mpi", "blaslapack", "ptscotch"]
        );
    }

    #[test]
    fn test_duplicate_dependency_rejected() {
        let contents = r#"
[package]
name = "mumps"
version = "4.10.0"

[dependencies]
required = ["mpi"]
optional = [{ name = "mpi", feature = "parallel" }]
"#;
        let err = PackageSpec::parse(contents).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn test_bad_download_url_rejected() {
        let contents = "[package]\nname = \"x\"\nversion = \"1.0.0\"\ndownload = [\"not a url\"]\n";
        assert!(PackageSpec::parse(contents).is_err());
    }

    #[test]
    fn test_feature_overrides() {
        let spec = PackageSpec::parse(MUMPS).unwrap();
        let features = FeatureSet::from_spec(&spec)
            .with_overrides(["ptscotch", "without-pthread"], ["without-pthread"]);

        assert!(features.is_enabled("ptscotch"));
        assert!(!features.is_enabled("without-pthread"));
        assert!(!features.is_enabled("never-mentioned"));
        assert_eq!(features.enabled().collect::<Vec<_>>(), vec!["ptscotch"]);
    }

    #[test]
    fn test_load_reports_syntax_error_with_span() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("mumps.toml");
        std::fs::write(&path, "[package]\nname = \"mumps\"\nversion = \"four\"\n").unwrap();

        let err = PackageSpec::load(&path).unwrap_err();
        let file_err = err.downcast_ref::<PackageFileError>().unwrap();
        assert!(file_err.path.ends_with("mumps.toml"));
        assert!(file_err.span.is_some());
    }
}
