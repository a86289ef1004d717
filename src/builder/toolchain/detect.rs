//! Toolchain detection by locating compilers and compiling tiny probes.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use tempfile::TempDir;

use crate::util::config::ToolchainSettings;
use crate::util::process::{find_tool, ProcessBuilder};

use super::probe::retained_flags;
use super::{FlagDenylist, ToolchainFacts, ToolchainQuery};

/// Matches a dotted version number in a `--version` banner.
static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+(\.\d+)?").expect("valid version regex"));

/// Routine names compiled into the mangling probe.
const PROBE_PLAIN: &str = "berthprobe";
const PROBE_UNDERSCORED: &str = "berth_probe";

/// Define-option spellings tried in order (`-WF,-D` is IBM XL Fortran).
const FORTRAN_DEFINE_CANDIDATES: &[&str] = &["-D", "-WF,-D"];

/// Bound on each probe compile and `--version` query.
const PROBE_TIMEOUT: Duration = Duration::from_secs(60);

/// Queries the compilers installed on this machine.
///
/// Probes compile with the same sanitized flags the package build will use,
/// so flags that change name mangling or the accepted dialect are seen here.
#[derive(Debug, Clone)]
pub struct SystemToolchainQuery {
    settings: ToolchainSettings,
    denylist: FlagDenylist,
    timeout: Duration,
}

impl Default for SystemToolchainQuery {
    fn default() -> Self {
        Self::new(ToolchainSettings::default())
    }
}

impl SystemToolchainQuery {
    /// Create a query honouring `[toolchain]` overrides.
    pub fn new(settings: ToolchainSettings) -> Self {
        SystemToolchainQuery {
            settings,
            denylist: FlagDenylist::default(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Strip these flags before they reach the probe compiles.
    pub fn with_denylist(mut self, denylist: FlagDenylist) -> Self {
        self.denylist = denylist;
        self
    }

    /// Bound each probe process.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn locate_cc(&self) -> Result<PathBuf> {
        self.settings
            .cc
            .clone()
            .or_else(|| find_tool("CC", &["cc", "gcc", "clang"]))
            .context("no C compiler found (set CC or `[toolchain] cc`)")
    }

    fn locate_fc(&self) -> Option<PathBuf> {
        self.settings.fc.clone().or_else(|| {
            find_tool(
                "FC",
                &["gfortran", "ifx", "ifort", "flang-new", "flang", "f90", "f95"],
            )
        })
    }

    fn locate_ar(&self) -> Result<PathBuf> {
        self.settings
            .ar
            .clone()
            .or_else(|| find_tool("AR", &["ar", "llvm-ar"]))
            .context("no archiver found (set AR or `[toolchain] ar`)")
    }

    fn locate_ranlib(&self) -> String {
        self.settings
            .ranlib
            .clone()
            .or_else(|| find_tool("RANLIB", &["ranlib", "llvm-ranlib"]))
            .map(|p| p.display().to_string())
            // Archivers that index on their own need no ranlib.
            .unwrap_or_else(|| "true".to_string())
    }

    fn flags(&self, configured: &Option<Vec<String>>, env_var: &str) -> Vec<String> {
        match configured {
            Some(flags) => flags.clone(),
            None => std::env::var(env_var)
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
        }
    }
}

impl ToolchainQuery for SystemToolchainQuery {
    fn query(&self) -> Result<ToolchainFacts> {
        let scratch = TempDir::new().context("failed to create probe directory")?;
        let dir = scratch.path();

        let cc = self.locate_cc()?;
        let cflags = self.flags(&self.settings.cflags, "CFLAGS");
        let c_probe = Prober {
            compiler: &cc,
            dir,
            flags: retained_flags(&cflags, &self.denylist.c)
                .map(str::to_string)
                .collect(),
            timeout: self.timeout,
        };
        let c_accepts_defines = probe_c_defines(&c_probe);

        let fc = self.locate_fc();
        let fflags = self.flags(&self.settings.fflags, "FFLAGS");

        let (fortran_is_f90, fortran_define_option, mangling) = match fc {
            Some(ref fc) => {
                let f_probe = Prober {
                    compiler: fc,
                    dir,
                    flags: retained_flags(&fflags, &self.denylist.fortran)
                        .map(str::to_string)
                        .collect(),
                    timeout: self.timeout,
                };
                (
                    probe_f90(&f_probe),
                    probe_fortran_define(&f_probe),
                    probe_mangling(&f_probe).unwrap_or_else(|e| {
                        tracing::debug!("mangling probe failed: {:#}", e);
                        "unknown".to_string()
                    }),
                )
            }
            None => (false, None, "unknown".to_string()),
        };

        let facts = ToolchainFacts {
            cc_identity: compiler_identity(&cc, self.timeout),
            cc,
            cflags,
            c_accepts_defines,
            fc_identity: fc
                .as_deref()
                .and_then(|fc| compiler_identity(fc, self.timeout)),
            fc,
            fflags,
            fortran_is_f90,
            fortran_define_option,
            mangling,
            ar: self.locate_ar()?,
            ar_flags: self
                .settings
                .ar_flags
                .clone()
                .unwrap_or_else(|| "cr".to_string()),
            ar_suffix: self
                .settings
                .ar_suffix
                .clone()
                .unwrap_or_else(|| "a".to_string()),
            ranlib: self.locate_ranlib(),
        };

        tracing::debug!("toolchain facts: {:?}", facts);
        Ok(facts)
    }
}

/// First line of `--version`, if it contains a version number.
fn compiler_identity(compiler: &Path, timeout: Duration) -> Option<String> {
    let output = ProcessBuilder::new(compiler)
        .arg("--version")
        .exec_with_timeout(timeout)
        .ok()
        .filter(|out| !out.timed_out)?;
    let first = output.stdout.lines().find(|l| !l.trim().is_empty())?.trim();

    VERSION_RE.is_match(first).then(|| first.to_string())
}

/// One compiler with the flags the package build will pass it.
struct Prober<'a> {
    compiler: &'a Path,
    dir: &'a Path,
    flags: Vec<String>,
    timeout: Duration,
}

impl Prober<'_> {
    /// Compile `source` in the scratch dir; true when the compiler succeeds in time.
    fn compiles(&self, file: &str, source: &str, extra: &[String]) -> bool {
        if std::fs::write(self.dir.join(file), source).is_err() {
            return false;
        }

        let result = ProcessBuilder::new(self.compiler)
            .args(&self.flags)
            .args(extra)
            .args(["-c", file, "-o", "probe.o"])
            .cwd(self.dir)
            .exec_with_timeout(self.timeout);

        match result {
            Ok(out) if out.timed_out => {
                tracing::warn!(
                    "probe compile with {} timed out after {:?}",
                    self.compiler.display(),
                    self.timeout
                );
                false
            }
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(
                    "probe compile with {} failed: {:#}",
                    self.compiler.display(),
                    e
                );
                false
            }
        }
    }
}

fn probe_c_defines(cc: &Prober<'_>) -> bool {
    let source = "#ifndef BERTH_PROBE\n#error define not passed\n#endif\nint berth_probe(void) { return 0; }\n";
    cc.compiles("define_probe.c", source, &["-DBERTH_PROBE".to_string()])
}

fn probe_f90(fc: &Prober<'_>) -> bool {
    let source = "module berth_probe_mod\n  implicit none\ncontains\n  subroutine berth_f90()\n    integer, allocatable :: a(:)\n    allocate(a(2))\n    deallocate(a)\n  end subroutine berth_f90\nend module berth_probe_mod\n";
    fc.compiles("f90_probe.f90", source, &[])
}

fn probe_fortran_define(fc: &Prober<'_>) -> Option<String> {
    let source = "#ifndef BERTH_PROBE\n#error define not passed\n#endif\n      subroutine berthdef()\n      end\n";

    FORTRAN_DEFINE_CANDIDATES
        .iter()
        .find(|opt| fc.compiles("define_probe.F", source, &[format!("{}BERTH_PROBE", opt)]))
        .map(|opt| opt.to_string())
}

fn probe_mangling(fc: &Prober<'_>) -> Result<String> {
    let source = format!(
        "      subroutine {}()\n      end\n      subroutine {}()\n      end\n",
        PROBE_PLAIN, PROBE_UNDERSCORED
    );
    if !fc.compiles("mangle_probe.f", &source, &[]) {
        anyhow::bail!("{} could not compile the mangling probe", fc.compiler.display());
    }

    let object = std::fs::read(fc.dir.join("probe.o")).context("failed to read probe object")?;
    Ok(classify_mangling(&object).to_string())
}

/// Classify the mangling by looking for decorated names in an object file.
pub(crate) fn classify_mangling(object: &[u8]) -> &'static str {
    let has = |name: &str| contains_symbol(object, name.as_bytes());

    if has(&PROBE_PLAIN.to_ascii_uppercase()) {
        "caps"
    } else if has(&format!("{}_", PROBE_PLAIN)) {
        if has(&format!("{}__", PROBE_UNDERSCORED)) {
            "double-underscore"
        } else {
            "underscore"
        }
    } else if has(PROBE_PLAIN) {
        "unchanged"
    } else {
        "unknown"
    }
}

/// Whether `name` occurs as a whole NUL-terminated symbol string.
pub(crate) fn contains_symbol(haystack: &[u8], name: &[u8]) -> bool {
    haystack
        .windows(name.len() + 1)
        .any(|w| &w[..name.len()] == name && w[name.len()] == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_with(symbols: &[&str]) -> Vec<u8> {
        let mut bytes = b"\x7fELF junk".to_vec();
        for s in symbols {
            bytes.push(0);
            bytes.extend_from_slice(s.as_bytes());
        }
        bytes.push(0);
        bytes
    }

    #[test]
    fn test_classify_underscore() {
        let obj = object_with(&["berthprobe_", "berth_probe_"]);
        assert_eq!(classify_mangling(&obj), "underscore");
    }

    #[test]
    fn test_classify_double_underscore() {
        let obj = object_with(&["berthprobe_", "berth_probe__"]);
        assert_eq!(classify_mangling(&obj), "double-underscore");
    }

    #[test]
    fn test_classify_caps() {
        let obj = object_with(&["BERTHPROBE", "BERTH_PROBE"]);
        assert_eq!(classify_mangling(&obj), "caps");
    }

    #[test]
    fn test_classify_unchanged() {
        let obj = object_with(&["berthprobe", "berth_probe"]);
        assert_eq!(classify_mangling(&obj), "unchanged");
    }

    #[test]
    fn test_classify_unknown() {
        let obj = object_with(&["_berthprobe@0"]);
        assert_eq!(classify_mangling(&obj), "unknown");
    }

    #[test]
    fn test_configured_flags_replace_environment() {
        let query = SystemToolchainQuery::new(ToolchainSettings {
            cflags: Some(vec!["-O3".to_string()]),
            ..Default::default()
        });
        assert_eq!(query.flags(&query.settings.cflags, "CFLAGS"), vec!["-O3"]);
    }

    /// Compiler stand-in: symbol names follow `-fno-underscoring`, `-Mfree`
    /// is rejected, and `--hang` never returns.
    #[cfg(unix)]
    const SCRIPTED_COMPILER: &str = r#"#!/bin/sh
prev=""
out=""
plain=0
for a in "$@"; do
  case "$a" in
    --version) echo "GNU Fortran (scripted) 13.2.0"; exit 0 ;;
    -fno-underscoring) plain=1 ;;
    -Mfree) echo "unknown option -Mfree" >&2; exit 1 ;;
    --hang) sleep 30 ;;
  esac
  if [ "$prev" = "-o" ]; then out="$a"; fi
  prev="$a"
done
if [ -n "$out" ]; then
  if [ "$plain" = 1 ]; then
    printf 'berthprobe\000berth_probe\000' > "$out"
  else
    printf 'berthprobe_\000berth_probe_\000' > "$out"
  fi
fi
exit 0
"#;

    #[cfg(unix)]
    fn scripted_settings(dir: &Path, fflags: &[&str]) -> ToolchainSettings {
        use std::os::unix::fs::PermissionsExt;

        let compiler = dir.join("scripted-cc");
        std::fs::write(&compiler, SCRIPTED_COMPILER).unwrap();
        let mut perms = std::fs::metadata(&compiler).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&compiler, perms).unwrap();

        ToolchainSettings {
            cc: Some(compiler.clone()),
            fc: Some(compiler.clone()),
            ar: Some(compiler.clone()),
            ranlib: Some(compiler),
            cflags: Some(Vec::new()),
            fflags: Some(fflags.iter().map(|f| f.to_string()).collect()),
            ..Default::default()
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_mangling_probe_sees_configured_fflags() {
        let tmp = TempDir::new().unwrap();

        let plain = SystemToolchainQuery::new(scripted_settings(tmp.path(), &["-O2"]))
            .query()
            .unwrap();
        assert_eq!(plain.mangling, "underscore");
        assert_eq!(plain.fc_identity.as_deref(), Some("GNU Fortran (scripted) 13.2.0"));

        let unmangled =
            SystemToolchainQuery::new(scripted_settings(tmp.path(), &["-O2 -fno-underscoring"]))
                .query()
                .unwrap();
        assert_eq!(unmangled.mangling, "unchanged");
        assert!(unmangled.fortran_is_f90);
    }

    #[cfg(unix)]
    #[test]
    fn test_denied_flags_do_not_reach_probes() {
        let tmp = TempDir::new().unwrap();
        let settings = scripted_settings(tmp.path(), &["-O2", "-Mfree"]);

        let facts = SystemToolchainQuery::new(settings.clone()).query().unwrap();
        assert!(facts.fortran_is_f90);
        assert_eq!(facts.fortran_define_option.as_deref(), Some("-D"));
        assert_eq!(facts.fflags, vec!["-O2", "-Mfree"]);

        let facts = SystemToolchainQuery::new(settings)
            .with_denylist(FlagDenylist {
                c: Vec::new(),
                fortran: Vec::new(),
            })
            .query()
            .unwrap();
        assert!(!facts.fortran_is_f90);
        assert_eq!(facts.fortran_define_option, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_compiler_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let mut settings = scripted_settings(tmp.path(), &["--hang"]);
        settings.cflags = Some(vec!["--hang".to_string()]);

        let start = std::time::Instant::now();
        let facts = SystemToolchainQuery::new(settings)
            .with_timeout(Duration::from_millis(200))
            .query()
            .unwrap();

        assert!(!facts.c_accepts_defines);
        assert!(!facts.fortran_is_f90);
        assert_eq!(facts.mangling, "unknown");
        assert!(start.elapsed() < Duration::from_secs(20));
    }
}
