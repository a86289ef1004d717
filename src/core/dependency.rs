//! Resolved dependency handles.
//!
//! A handle is what the surrounding package manager knows about an already
//! installed dependency: its header directories and its libraries. Handles
//! are read-only here and render themselves into compiler/linker flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyHandle {
    /// Dependency name
    pub name: String,

    /// Header directories, in search order
    #[serde(default)]
    pub include: Vec<PathBuf>,

    /// Libraries, in link order
    ///
    /// Entries are library files (`/opt/lib/libmetis.a`) or raw linker
    /// arguments (`-lgfortran`), the latter passed through verbatim.
    #[serde(default)]
    pub lib: Vec<PathBuf>,
}

impl DependencyHandle {
    /// Create a handle with no paths.
    pub fn new(name: impl Into<String>) -> Self {
        DependencyHandle {
            name: name.into(),
            include: Vec::new(),
            lib: Vec::new(),
        }
    }

    /// Append a header directory.
    pub fn with_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include.push(dir.into());
        self
    }

    /// Append a library.
    pub fn with_lib(mut self, lib: impl Into<PathBuf>) -> Self {
        self.lib.push(lib.into());
        self
    }

    /// Header directories as `-I` flags.
    pub fn include_flags(&self) -> String {
        include_flags(&self.include)
    }

    /// Libraries as linker arguments.
    pub fn lib_flags(&self) -> String {
        lib_flags(&self.lib)
    }
}

/// Render header directories as `-I` flags.
pub fn include_flags(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| format!("-I{}", d.display()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render libraries as linker arguments.
///
/// `dir/libfoo.a` becomes `-Ldir -lfoo`; each `-L` is emitted once, at its
/// first use, so link order is preserved.
pub fn lib_flags(libs: &[PathBuf]) -> String {
    let mut args: Vec<String> = Vec::new();
    let mut search_dirs: Vec<&Path> = Vec::new();

    for lib in libs {
        let text = lib.to_string_lossy();
        if text.starts_with('-') {
            args.push(text.into_owned());
            continue;
        }

        match library_stem(lib) {
            Some(stem) => {
                if let Some(dir) = lib.parent().filter(|d| !d.as_os_str().is_empty()) {
                    if !search_dirs.contains(&dir) {
                        search_dirs.push(dir);
                        args.push(format!("-L{}", dir.display()));
                    }
                }
                args.push(format!("-l{}", stem));
            }
            None => args.push(text.into_owned()),
        }
    }

    args.join(" ")
}

/// Extract `foo` from `libfoo.a`, `libfoo.so`, `libfoo.so.3` or `libfoo.dylib`.
fn library_stem(lib: &Path) -> Option<&str> {
    let file = lib.file_name()?.to_str()?;
    let rest = file.strip_prefix("lib")?;

    if let Some(stem) = rest
        .strip_suffix(".a")
        .or_else(|| rest.strip_suffix(".dylib"))
    {
        return (!stem.is_empty()).then_some(stem);
    }

    let idx = rest.find(".so")?;
    let tail = &rest[idx + 3..];
    (idx > 0 && (tail.is_empty() || tail.starts_with('.'))).then(|| &rest[..idx])
}

/// Resolved dependencies of one package, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDeps {
    handles: Vec<DependencyHandle>,
}

impl ResolvedDeps {
    /// Create from handles already in declaration order.
    pub fn new(handles: Vec<DependencyHandle>) -> Self {
        ResolvedDeps { handles }
    }

    /// Look up a handle by name.
    pub fn get(&self, name: &str) -> Option<&DependencyHandle> {
        self.handles.iter().find(|h| h.name == name)
    }

    /// Whether a dependency was resolved.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// `-I` flags for a dependency, empty when it was not resolved.
    pub fn include_flags(&self, name: &str) -> String {
        self.get(name).map(|h| h.include_flags()).unwrap_or_default()
    }

    /// Linker arguments for a dependency, empty when it was not resolved.
    pub fn lib_flags(&self, name: &str) -> String {
        self.get(name).map(|h| h.lib_flags()).unwrap_or_default()
    }

    /// Iterate handles in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &DependencyHandle> {
        self.handles.iter()
    }

    /// Resolved names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.handles.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
