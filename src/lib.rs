//! Berth - builds third-party numerical libraries with their native makefiles
//!
//! This crate provides the core library functionality for Berth: dependency
//! lookup, toolchain probing, build-control file generation, rebuild
//! detection, bounded build execution and install recording.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

/// Test utilities and mocks for Berth unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides canned toolchains, package fixtures, and mock
/// process execution and staging.
#[cfg(test)]
pub mod test_support;

pub use builder::{BuildConfig, ToolchainProfile};
pub use crate::core::{DependencyHandle, InstallLayout, PackageSpec};
pub use ops::{InstallOutcome, InstallRequest, Orchestrator, OrchestratorConfig};
pub use resolver::DependencyIndex;
pub use util::context::GlobalContext;
