//! Build event types for JSON output.
//!
//! This module defines the stable JSON schema for machine-readable build output.
//! These events are emitted when using `--message-format=json`.
//!
//! # Event Types
//!
//! - `build-started`: A build was accepted for a backend
//! - `state-changed`: The orchestrator moved between states
//! - `backend-invocation`: The exact command about to be spawned
//! - `diagnostic`: A classified failure or warning
//! - `build-finished`: Build completed (success or failure)
//!
//! # Stability
//!
//! The JSON schema is versioned and should remain backwards compatible.
//! New fields may be added, but existing fields should not be removed or renamed.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::diagnostics::DiagnosticKind;
use crate::builder::invocation::BackendInvocation;
use crate::builder::shim::BackendId;

/// State of the build orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildState {
    Idle,
    Cleaning,
    Validating,
    Translating,
    Invoking,
    Reporting,
    Done,
    Failed,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Idle => "idle",
            BuildState::Cleaning => "cleaning",
            BuildState::Validating => "validating",
            BuildState::Translating => "translating",
            BuildState::Invoking => "invoking",
            BuildState::Reporting => "reporting",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        }
    }

    /// Terminal states are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A build event emitted during the build process.
///
/// Each event is serialized as a single JSON object per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// Build started event with metadata.
    #[serde(rename = "build-started")]
    BuildStarted {
        /// Selected backend
        backend: BackendId,
        /// Output directory owned by this build
        output_dir: PathBuf,
    },

    /// The orchestrator changed state.
    #[serde(rename = "state-changed")]
    StateChanged { from: BuildState, to: BuildState },

    /// The backend command about to be spawned.
    #[serde(rename = "backend-invocation")]
    Invocation {
        backend: BackendId,
        /// Program followed by its arguments
        command: Vec<String>,
        /// Working directory
        cwd: PathBuf,
    },

    /// A generic diagnostic message.
    #[serde(rename = "diagnostic")]
    Diagnostic {
        /// Severity level ("error", "warning", "note", "help")
        level: String,
        /// Failure category, for errors
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<DiagnosticKind>,
        /// Message text
        message: String,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        /// Whether the build succeeded
        success: bool,
        /// Total build duration in milliseconds
        duration_ms: u64,
        /// Produced artifact
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact: Option<PathBuf>,
    },
}

impl BuildEvent {
    /// Create a build started event.
    pub fn started(backend: BackendId, output_dir: impl Into<PathBuf>) -> Self {
        BuildEvent::BuildStarted {
            backend,
            output_dir: output_dir.into(),
        }
    }

    /// Create a state transition event.
    pub fn transition(from: BuildState, to: BuildState) -> Self {
        BuildEvent::StateChanged { from, to }
    }

    /// Create an invocation event.
    pub fn invocation(invocation: &BackendInvocation) -> Self {
        let mut command = vec![invocation.program.display().to_string()];
        command.extend(invocation.argv());
        BuildEvent::Invocation {
            backend: invocation.backend,
            command,
            cwd: invocation.cwd.clone(),
        }
    }

    /// Create an error diagnostic event.
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "error".to_string(),
            kind: Some(kind),
            message: message.into(),
        }
    }

    /// Create a warning diagnostic event.
    pub fn warning(message: impl Into<String>) -> Self {
        BuildEvent::Diagnostic {
            level: "warning".to_string(),
            kind: None,
            message: message.into(),
        }
    }

    /// Create a build finished event.
    pub fn finished(success: bool, duration_ms: u64, artifact: Option<PathBuf>) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            artifact,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
