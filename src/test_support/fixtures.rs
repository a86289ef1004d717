//! Test fixtures for common test scenarios.
//!
//! The package under test throughout is MUMPS 4.10: a Fortran/C sparse
//! solver with five required dependencies and one feature-gated one.

use std::path::PathBuf;

use crate::builder::toolchain::{ManglingScheme, ToolchainFacts, ToolchainProfile};
use crate::core::{DependencyHandle, InstallLayout, PackageSpec, ResolvedDeps};
use crate::resolver::DependencyIndex;

/// Package file for MUMPS.
pub const MUMPS_PACKAGE: &str = r#"
[package]
name = "mumps"
version = "4.10.0"
download = ["http://ftp.mcs.anl.gov/pub/petsc/externalpackages/MUMPS_4.10.0-p1.tar.gz"]
source = "MUMPS_4.10.0-p1"
complex = true

[artifacts]
libraries = [
  ["libcmumps.a", "libdmumps.a", "libsmumps.a", "libzmumps.a", "libmumps_common.a", "libpord.a"],
  ["libcmumps.a", "libdmumps.a", "libsmumps.a", "libzmumps.a", "libmumps_common.a", "libpord.a", "libpthread.a"],
]
functions = ["dmumps_c"]
includes = ["dmumps_c.h"]

[dependencies]
required = ["parmetis", "scalapack", "blacs", "mpi", "blaslapack"]
optional = [{ name = "ptscotch" }]

[features]
ptscotch = false
"#;

/// Parsed MUMPS package.
pub fn mumps_spec() -> PackageSpec {
    PackageSpec::parse(MUMPS_PACKAGE).expect("fixture package parses")
}

fn handles(with_ptscotch: bool) -> Vec<DependencyHandle> {
    let mut handles = vec![
        DependencyHandle::new("parmetis")
            .with_include("/opt/parmetis/include")
            .with_lib("/opt/parmetis/lib/libparmetis.a")
            .with_lib("/opt/parmetis/lib/libmetis.a"),
        DependencyHandle::new("scalapack").with_lib("/opt/scalapack/lib/libscalapack.a"),
        DependencyHandle::new("blacs")
            .with_lib("/opt/blacs/lib/libblacs.a")
            .with_lib("/opt/blacs/lib/libblacsCinit.a"),
        DependencyHandle::new("mpi")
            .with_include("/usr/include/mpich")
            .with_lib("/usr/lib/libmpich.so"),
        DependencyHandle::new("blaslapack")
            .with_lib("/usr/lib/liblapack.so")
            .with_lib("/usr/lib/libblas.so"),
    ];

    if with_ptscotch {
        handles.push(
            DependencyHandle::new("ptscotch")
                .with_include("/opt/scotch/include")
                .with_lib("/opt/scotch/lib/libptesmumps.a")
                .with_lib("/opt/scotch/lib/libptscotch.a")
                .with_lib("/opt/scotch/lib/libptscotcherr.a"),
        );
    }
    handles
}

/// Resolved MUMPS dependencies, optionally with the SCOTCH partitioner.
pub fn mumps_deps(with_ptscotch: bool) -> ResolvedDeps {
    ResolvedDeps::new(handles(with_ptscotch))
}

/// An index holding every MUMPS dependency, ptscotch included.
pub fn mumps_index() -> DependencyIndex {
    let mut index = DependencyIndex::new();
    for handle in handles(true) {
        index.insert(handle);
    }
    index
}

/// Raw facts of a GNU toolchain behind MPI wrappers.
pub fn gnu_facts() -> ToolchainFacts {
    ToolchainFacts {
        cc: PathBuf::from("/usr/bin/mpicc"),
        cc_identity: Some("gcc (GCC) 13.2.0".to_string()),
        cflags: vec!["-O2".to_string(), "-fPIC".to_string()],
        c_accepts_defines: true,
        fc: Some(PathBuf::from("/usr/bin/mpif90")),
        fc_identity: Some("GNU Fortran (GCC) 13.2.0".to_string()),
        fflags: vec!["-O2".to_string()],
        fortran_is_f90: true,
        fortran_define_option: Some("-D".to_string()),
        mangling: "underscore".to_string(),
        ar: PathBuf::from("/usr/bin/ar"),
        ar_flags: "cr".to_string(),
        ar_suffix: "a".to_string(),
        ranlib: "/usr/bin/ranlib".to_string(),
    }
}

/// The profile probing [`gnu_facts`] yields.
pub fn gnu_profile() -> ToolchainProfile {
    ToolchainProfile {
        cc: "/usr/bin/mpicc".to_string(),
        cc_identity: Some("gcc (GCC) 13.2.0".to_string()),
        cflags: "-O2 -fPIC".to_string(),
        fc: "/usr/bin/mpif90".to_string(),
        fc_identity: Some("GNU Fortran (GCC) 13.2.0".to_string()),
        fflags: "-O2".to_string(),
        fortran_define_option: "-D".to_string(),
        ar: "/usr/bin/ar".to_string(),
        ar_flags: "cr".to_string(),
        ar_suffix: "a".to_string(),
        ranlib: "/usr/bin/ranlib".to_string(),
        mangling: ManglingScheme::Underscore,
        fortran_is_f90: true,
        c_accepts_defines: true,
    }
}

/// Write a complete MUMPS install into `layout`; returns the written paths.
pub fn install_mumps_artifacts(layout: &InstallLayout) -> Vec<PathBuf> {
    let lib_dir = layout.lib_dir();
    let include_dir = layout.include_dir();
    std::fs::create_dir_all(&lib_dir).expect("create lib dir");
    std::fs::create_dir_all(&include_dir).expect("create include dir");

    let mut written = Vec::new();
    for lib in [
        "libcmumps.a",
        "libdmumps.a",
        "libsmumps.a",
        "libzmumps.a",
        "libmumps_common.a",
        "libpord.a",
    ] {
        let path = lib_dir.join(lib);
        let mut bytes = b"!<arch>\n/               0           0     0     0       32        `\n".to_vec();
        if lib == "libdmumps.a" {
            bytes.extend_from_slice(b"dmumps_c\0dmumps_f77_\0");
        }
        std::fs::write(&path, bytes).expect("write library");
        written.push(path);
    }

    let header = include_dir.join("dmumps_c.h");
    std::fs::write(&header, "#define MUMPS_VERSION \"4.10.0\"\n").expect("write header");
    written.push(header);
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{FlagDenylist, ToolchainProbe};
    use crate::test_support::StaticToolchain;

    #[test]
    fn test_gnu_facts_probe_to_gnu_profile() {
        let query = StaticToolchain::new(gnu_facts());
        let deny = FlagDenylist::default();

        assert_eq!(ToolchainProbe::new(&query, &deny).probe().unwrap(), gnu_profile());
    }

    #[test]
    fn test_mumps_deps_match_index() {
        let index = mumps_index();
        assert_eq!(index.len(), 6);
        assert_eq!(mumps_deps(false).len(), 5);
        assert!(mumps_deps(true).contains("ptscotch"));
    }
}
