//! High-level operations.
//!
//! This module contains the implementation of Stowage commands.

pub mod clean;
pub mod doctor;
pub mod stowage_build;

pub use clean::{clean, remove_artifacts, CleanReport};
pub use doctor::{doctor, format_report, DoctorOptions, DoctorReport};
pub use stowage_build::{BuildDiagnostic, BuildOrchestrator, BuildResult, BuildStatus};
