//! Moving built artifacts into the install prefix.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::InstallLayout;
use crate::util::fs::{copy_file, ensure_dir, glob_files, move_file};

/// Places the artifacts of a finished native build into the install prefix.
pub trait ArtifactStager {
    /// Stage artifacts from `work_dir`; returns the installed paths.
    fn stage(&self, work_dir: &Path, layout: &InstallLayout) -> Result<Vec<PathBuf>>;
}

/// Stages from the conventional `lib/` and `include/` directories of the
/// source tree.
///
/// Libraries are moved (the next build regenerates them); headers are copied
/// because they are part of the pristine sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStager;

impl ArtifactStager for FsStager {
    fn stage(&self, work_dir: &Path, layout: &InstallLayout) -> Result<Vec<PathBuf>> {
        let lib_dir = layout.lib_dir();
        let include_dir = layout.include_dir();
        ensure_dir(&lib_dir)?;
        ensure_dir(&include_dir)?;

        let libs = glob_files(work_dir, &["lib/*.*"])?;
        if libs.is_empty() {
            anyhow::bail!(
                "build produced no libraries under {}",
                work_dir.join("lib").display()
            );
        }

        let mut staged = Vec::new();
        for lib in libs {
            let dst = lib_dir.join(file_name(&lib)?);
            move_file(&lib, &dst)?;
            staged.push(dst);
        }

        for header in glob_files(work_dir, &["include/*.*"])? {
            let dst = include_dir.join(file_name(&header)?);
            copy_file(&header, &dst)?;
            staged.push(dst);
        }

        tracing::debug!("staged {} file(s) into {}", staged.len(), layout.prefix().display());
        Ok(staged)
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| format!("artifact has no file name: {}", path.display()))
}
