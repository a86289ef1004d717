//! Build-control file generation.
//!
//! The native build of the package reads a flat `Makefile.inc` of
//! `NAME = VALUE` lines. Generation is a pure function of the toolchain
//! profile, the resolved dependencies and the enabled options: the same
//! inputs always produce the same bytes, which is what lets the install
//! record detect "nothing changed".

use std::path::Path;

use anyhow::Result;

use crate::builder::toolchain::ToolchainProfile;
use crate::core::{FeatureSet, ResolvedDeps};
use crate::util::fs::write_string;
use crate::util::hash::sha256_str;

/// File name of the generated build-control file.
pub const MAKEINC_FILE: &str = "Makefile.inc";

/// Dependency supplying the graph orderings (METIS + ParMETIS).
pub const DEP_ORDERING: &str = "parmetis";
/// Optional dependency supplying the SCOTCH orderings.
pub const DEP_PARTITIONER: &str = "ptscotch";
/// Parallel runtime.
pub const DEP_MPI: &str = "mpi";
/// Distributed dense linear algebra.
pub const DEP_SCALAPACK: &str = "scalapack";
/// Communication layer under ScaLAPACK.
pub const DEP_BLACS: &str = "blacs";
/// Sequential dense linear algebra.
pub const DEP_BLASLAPACK: &str = "blaslapack";

/// Option that builds without POSIX threads (C sources only).
pub const OPT_WITHOUT_PTHREAD: &str = "without-pthread";

/// Ordered build-control directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    directives: Vec<(String, String)>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a directive.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.directives.push((name.into(), value.into()));
        self
    }

    /// Value of the first directive with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Directive names in output order.
    pub fn names(&self) -> Vec<&str> {
        self.directives.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Canonical serialization, byte-for-byte the file content.
    ///
    /// Trailing spaces in values are significant (`OUTC = -o ` is glued to
    /// `$@` by the native makefiles) and are kept.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.directives {
            if value.is_empty() {
                out.push_str(&format!("{} =\n", name));
            } else {
                out.push_str(&format!("{} = {}\n", name, value));
            }
        }
        out
    }

    /// SHA-256 of the canonical serialization.
    pub fn fingerprint(&self) -> String {
        sha256_str(&self.render())
    }

    /// Write the rendered file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_string(path, &self.render())
    }
}

/// When a feature-toggle rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Always,
    /// The named dependency was resolved
    WithDependency(&'static str),
    /// The named option is enabled
    WithOption(&'static str),
}

/// One token contributed to the ordering feature strings.
#[derive(Debug, Clone, Copy)]
pub struct ToggleRule {
    pub token: &'static str,
    pub applies: Applies,
    /// Whether the Fortran sources see the token too
    pub fortran: bool,
}

impl ToggleRule {
    const fn both(token: &'static str, applies: Applies) -> Self {
        ToggleRule {
            token,
            applies,
            fortran: true,
        }
    }

    const fn c_only(token: &'static str, applies: Applies) -> Self {
        ToggleRule {
            token,
            applies,
            fortran: false,
        }
    }

    fn is_active(&self, deps: &ResolvedDeps, features: &FeatureSet) -> bool {
        match self.applies {
            Applies::Always => true,
            Applies::WithDependency(name) => deps.contains(name),
            Applies::WithOption(name) => features.is_enabled(name),
        }
    }
}

/// Ordering tokens, in output order.
pub const ORDERING_RULES: &[ToggleRule] = &[
    ToggleRule::both("metis", Applies::Always),
    ToggleRule::both("parmetis", Applies::Always),
    ToggleRule::both("pord", Applies::Always),
    ToggleRule::c_only("WITHOUT_PTHREAD", Applies::WithOption(OPT_WITHOUT_PTHREAD)),
    ToggleRule::both("scotch", Applies::WithDependency(DEP_PARTITIONER)),
    ToggleRule::both("ptscotch", Applies::WithDependency(DEP_PARTITIONER)),
];

/// Fold the rules into the C-style and Fortran-style toggle strings.
pub fn ordering_tokens(
    rules: &[ToggleRule],
    profile: &ToolchainProfile,
    deps: &ResolvedDeps,
    features: &FeatureSet,
) -> (String, String) {
    let (c, fortran) = rules
        .iter()
        .filter(|rule| rule.is_active(deps, features))
        .fold((Vec::new(), Vec::new()), |(mut c, mut f), rule| {
            c.push(format!("-D{}", rule.token));
            if rule.fortran {
                f.push(format!("{}{}", profile.fortran_define_option, rule.token));
            }
            (c, f)
        });

    (c.join(" "), fortran.join(" "))
}

/// Generate the build-control directives.
pub fn generate(profile: &ToolchainProfile, deps: &ResolvedDeps, features: &FeatureSet) -> BuildConfig {
    let mut cfg = BuildConfig::new();
    let with_partitioner = deps.contains(DEP_PARTITIONER);

    // Orderings. PORD ships inside the package source tree.
    cfg.set("LPORDDIR", "$(topdir)/PORD/lib/")
        .set("IPORD", "-I$(topdir)/PORD/include/")
        .set("LPORD", "-L$(LPORDDIR) -lpord")
        .set("IMETIS", deps.include_flags(DEP_ORDERING))
        .set("LMETIS", deps.lib_flags(DEP_ORDERING));
    if with_partitioner {
        cfg.set("ISCOTCH", deps.include_flags(DEP_PARTITIONER))
            .set("LSCOTCH", deps.lib_flags(DEP_PARTITIONER));
    }

    let (orderings_c, orderings_f) = ordering_tokens(ORDERING_RULES, profile, deps, features);
    cfg.set("ORDERINGSC", orderings_c)
        .set("ORDERINGSF", orderings_f)
        .set("LORDERINGS", "$(LMETIS) $(LPORD) $(LSCOTCH)")
        .set("IORDERINGSC", "$(IMETIS) $(IPORD) $(ISCOTCH)")
        .set("IORDERINGSF", "$(ISCOTCH)");

    // Compilers, copied verbatim from the profile.
    cfg.set("RM", "/bin/rm -f")
        .set("CC", profile.cc.as_str())
        .set("OPTC", profile.cflags.as_str())
        .set("OUTC", "-o ")
        .set("FC", profile.fc.as_str())
        .set("FL", profile.fc.as_str())
        .set("OPTF", profile.fflags.as_str())
        .set("OUTF", "-o ")
        .set("CDEFS", profile.mangling.define_token())
        .set("AR", format!("{} {} ", profile.ar, profile.ar_flags))
        .set("LIBEXT", format!(".{}", profile.ar_suffix))
        .set("RANLIB", profile.ranlib.as_str());

    // Parallel runtime and linear algebra.
    let scalap = [deps.lib_flags(DEP_SCALAPACK), deps.lib_flags(DEP_BLACS)]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let libpar = ["$(SCALAP)".to_string(), deps.lib_flags(DEP_MPI)]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    cfg.set("SCALAP", scalap)
        .set("INCPAR", deps.include_flags(DEP_MPI))
        .set("LIBPAR", libpar);

    // Sequential fallback, built in-tree as libmpiseq.
    cfg.set("INCSEQ", "-I$(topdir)/libseq")
        .set("LIBSEQ", "$(LAPACK) -L$(topdir)/libseq -lmpiseq")
        .set("LIBBLAS", deps.lib_flags(DEP_BLASLAPACK))
        .set("OPTL", "-O -I.")
        .set("INCS", "$(INCPAR)")
        .set("LIB", "$(LIBPAR)")
        .set("LIBSEQNEEDED", "");

    cfg
}
