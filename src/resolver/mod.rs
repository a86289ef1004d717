//! Dependency resolution.
//!
//! Looks up the already-installed dependencies a package needs and orders a
//! batch of packages for installation.

pub mod errors;
pub mod resolve;
pub mod schedule;

pub use errors::ResolveError;
pub use resolve::{DependencyIndex, DependencyResolver, DependencySource};
pub use schedule::install_order;
