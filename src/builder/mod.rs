//! Building an external package with its native makefiles.
//!
//! This module probes the toolchain, generates the build-control file,
//! decides whether a rebuild is needed, runs the build and records the
//! result.

pub mod executor;
pub mod fingerprint;
pub mod install;
pub mod makeinc;
pub mod stage;
pub mod toolchain;

pub use executor::{BuildExecutor, ExecError, ProcessRunner, SystemProcessRunner};
pub use fingerprint::{ChangeDetector, Freshness, InstallRecord};
pub use install::InstallRecorder;
pub use makeinc::BuildConfig;
pub use stage::{ArtifactStager, FsStager};
pub use toolchain::{ProbeError, SystemToolchainQuery, ToolchainProbe, ToolchainProfile};
