//! Packaging backends.
//!
//! This module holds everything needed to turn a build config into a backend
//! command line and to make sense of the backend's failures.

pub mod context;
pub mod diagnostics;
pub mod events;
pub mod invocation;
pub mod shim;

pub use context::BuildContext;
pub use diagnostics::{DiagnosticKind, DiagnosticsClassifier, FailureSignal};
pub use events::{BuildEvent, BuildState};
pub use invocation::BackendInvocation;
