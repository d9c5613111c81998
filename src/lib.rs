//! Stowage - one build interface over Python packaging backends
//!
//! This crate maps a single, backend-agnostic build configuration onto
//! Nuitka or PyInstaller invocations, runs the selected backend and turns
//! its failures into actionable diagnostics.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for Stowage unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a mock process runner and project fixtures.
#[cfg(test)]
pub mod test_support;

pub use builder::shim::{BackendId, BackendRegistry, BackendShim};
pub use builder::BuildContext;
pub use core::{BuildConfig, PathMapping, PathMappingParser};
pub use ops::{BuildOrchestrator, BuildResult, BuildStatus};
pub use util::context::GlobalContext;
