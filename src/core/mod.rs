//! Core data structures for Berth.
//!
//! This module contains the foundational types used throughout Berth:
//! - Package files and effective options
//! - Resolved dependency handles
//! - Install prefix layout

pub mod dependency;
pub mod layout;
pub mod package;

pub use dependency::{DependencyHandle, ResolvedDeps};
pub use layout::InstallLayout;
pub use package::{FeatureSet, PackageSpec};
