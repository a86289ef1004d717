//! Dependency resolution against an external source of installed packages.
//!
//! Berth does no version solving. Whatever manages the wider dependency
//! graph has already installed each dependency; here we only look the
//! handles up by name and fix their order.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{DependencyHandle, FeatureSet, PackageSpec, ResolvedDeps};
use crate::resolver::errors::ResolveError;

/// Source of already-installed dependencies.
pub trait DependencySource {
    /// Look up an installed dependency by name.
    fn lookup(&self, name: &str) -> Option<DependencyHandle>;
}

/// A TOML file of installed dependencies.
///
/// ```toml
/// [deps.mpi]
/// include = ["/usr/lib/x86_64-linux-gnu/openmpi/include"]
/// lib = ["/usr/lib/x86_64-linux-gnu/libmpi.so"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyIndex {
    #[serde(default)]
    deps: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct IndexEntry {
    #[serde(default)]
    include: Vec<std::path::PathBuf>,
    #[serde(default)]
    lib: Vec<std::path::PathBuf>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an index file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dependency index: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse dependency index: {}", path.display()))
    }

    /// Register (or replace) an installed dependency.
    pub fn insert(&mut self, handle: DependencyHandle) {
        self.deps.insert(
            handle.name,
            IndexEntry {
                include: handle.include,
                lib: handle.lib,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

impl DependencySource for DependencyIndex {
    fn lookup(&self, name: &str) -> Option<DependencyHandle> {
        self.deps.get(name).map(|entry| DependencyHandle {
            name: name.to_string(),
            include: entry.include.clone(),
            lib: entry.lib.clone(),
        })
    }
}

/// Resolves a package's dependencies into ordered handles.
pub struct DependencyResolver<'a> {
    source: &'a dyn DependencySource,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(source: &'a dyn DependencySource) -> Self {
        DependencyResolver { source }
    }

    /// Resolve required dependencies, then enabled feature-gated ones.
    ///
    /// A missing dependency fails the whole resolution; nothing is retried.
    pub fn resolve(
        &self,
        spec: &PackageSpec,
        features: &FeatureSet,
    ) -> Result<ResolvedDeps, ResolveError> {
        let mut handles = Vec::new();

        for name in &spec.dependencies.required {
            let handle = self.lookup(spec, name, None)?;
            handles.push(handle);
        }

        for optional in &spec.dependencies.optional {
            let feature = optional.feature();
            if !features.is_enabled(feature) {
                tracing::debug!(
                    "skipping `{}`: option `{}` is not enabled",
                    optional.name,
                    feature
                );
                continue;
            }
            let handle = self.lookup(spec, &optional.name, Some(feature))?;
            handles.push(handle);
        }

        let resolved = ResolvedDeps::new(handles);
        tracing::debug!(
            "resolved dependencies of `{}`: {}",
            spec.name(),
            resolved.names().join(", ")
        );
        Ok(resolved)
    }

    fn lookup(
        &self,
        spec: &PackageSpec,
        name: &str,
        feature: Option<&str>,
    ) -> Result<DependencyHandle, ResolveError> {
        self.source
            .lookup(name)
            .ok_or_else(|| ResolveError::MissingDependency {
                package: spec.name().to_string(),
                dependency: name.to_string(),
                feature: feature.map(str::to_string),
            })
    }
}
