//! High-level operations.
//!
//! This module contains the implementation of Berth commands.

pub mod install;
pub mod status;
pub mod verify;

pub use install::{InstallOutcome, InstallRequest, Orchestrator, OrchestratorConfig, RequestError};
pub use status::{format_status, status, PackageStatus};
pub use verify::{verify_install, VerifiedInstall, VerifyError};
