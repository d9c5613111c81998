//! Failure classification for packaging builds.
//!
//! Backends report failures as free text. The classifier maps that text (plus
//! what the orchestrator observed directly) onto a closed set of
//! [`DiagnosticKind`]s. Matching is best-effort; anything unrecognized is a
//! [`DiagnosticKind::BackendCompileFailure`].

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::RegexSet;
use serde::Serialize;

use crate::builder::shim::BackendId;
use crate::util::diagnostic::suggestions;
use crate::util::process::ProcessOutput;

/// Backend or its prerequisites are not installed.
static TOOLCHAIN_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"No module named '?(?i:nuitka|pyinstaller)\b",
        r"is not recognized as an internal or external command",
        r"command not found",
        r"(?i)cannot locate suitable C compiler",
        r"is not supported by Nuitka",
    ])
    .expect("toolchain patterns are valid")
});

/// A declared data file is missing when the backend looks for it.
static RESOURCE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"Unable to find .* when adding binary and data files",
        r"(?i)failed to locate data (file|dir)",
        r"(?i)data (file|directory|dir) .* (not found|does not exist)",
    ])
    .expect("resource patterns are valid")
});

/// The built artifact cannot load a shared library.
static RUNTIME_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"error while loading shared libraries",
        r"Library not loaded",
        r"(?i)\.dll was not found",
        r"(?i)vcruntime\d*\.dll",
        r"(?i)DLL load failed",
        r"Failed to load Python (shared )?(library|DLL)",
    ])
    .expect("runtime patterns are valid")
});

/// Closed set of build failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// Backend, interpreter or compiler not found
    ToolchainMissing,
    /// A declared data include vanished before the backend read it
    ResourcePathMissing,
    /// The artifact was built but cannot load a shared runtime library
    RuntimeDependencyMissing,
    /// Backend failed for an unrecognized reason
    BackendCompileFailure,
    /// The build config was rejected before spawning
    ConfigInvalid,
    /// The backend cannot express a requested option
    UnsupportedOption,
    /// Another build owns the output directory
    TargetBusy,
    /// The build was cancelled
    Interrupted,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ToolchainMissing => "toolchain-missing",
            DiagnosticKind::ResourcePathMissing => "resource-path-missing",
            DiagnosticKind::RuntimeDependencyMissing => "runtime-dependency-missing",
            DiagnosticKind::BackendCompileFailure => "backend-compile-failure",
            DiagnosticKind::ConfigInvalid => "config-invalid",
            DiagnosticKind::UnsupportedOption => "unsupported-option",
            DiagnosticKind::TargetBusy => "target-busy",
            DiagnosticKind::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything observed about a failed backend run.
#[derive(Debug, Clone, Default)]
pub struct FailureSignal {
    /// Exit code; `None` if killed or never started
    pub exit_code: Option<i32>,
    /// Captured stdout followed by stderr
    pub output: String,
    /// Process was terminated through cancellation
    pub interrupted: bool,
    /// Process could not be started
    pub spawn_error: Option<io::ErrorKind>,
    /// Exit status was zero but the expected artifact is absent
    pub artifact_missing: bool,
    /// Output of a failed post-build smoke check
    pub smoke_failure: Option<String>,
    /// The backend version check failed
    pub toolchain_check_failed: bool,
    /// Data sources that no longer exist
    pub vanished_sources: Vec<PathBuf>,
}

impl FailureSignal {
    /// Signal from a finished (or terminated) backend process.
    pub fn from_output(output: &ProcessOutput) -> Self {
        FailureSignal {
            exit_code: output.exit_code,
            output: output.combined(),
            interrupted: output.interrupted,
            ..FailureSignal::default()
        }
    }

    /// Signal from a backend that could not be started.
    pub fn spawn_failed(error: &io::Error) -> Self {
        FailureSignal {
            output: error.to_string(),
            spawn_error: Some(error.kind()),
            ..FailureSignal::default()
        }
    }

    pub fn with_artifact_missing(mut self, missing: bool) -> Self {
        self.artifact_missing = missing;
        self
    }

    pub fn with_smoke_failure(mut self, output: impl Into<String>) -> Self {
        self.smoke_failure = Some(output.into());
        self
    }

    pub fn with_toolchain_check_failed(mut self, failed: bool) -> Self {
        self.toolchain_check_failed = failed;
        self
    }

    pub fn with_vanished_sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.vanished_sources = sources;
        self
    }
}

/// Maps failure signals of one backend to diagnostic kinds.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsClassifier {
    backend: BackendId,
}

impl DiagnosticsClassifier {
    pub fn new(backend: BackendId) -> Self {
        DiagnosticsClassifier { backend }
    }

    /// Classify a failure. Always returns a kind.
    pub fn classify(&self, signal: &FailureSignal) -> DiagnosticKind {
        if signal.interrupted {
            return DiagnosticKind::Interrupted;
        }

        if signal.spawn_error == Some(io::ErrorKind::NotFound) {
            return DiagnosticKind::ToolchainMissing;
        }

        if let Some(ref smoke) = signal.smoke_failure {
            if RUNTIME_PATTERNS.is_match(smoke) {
                return DiagnosticKind::RuntimeDependencyMissing;
            }
        }

        if signal.toolchain_check_failed || TOOLCHAIN_PATTERNS.is_match(&signal.output) {
            return DiagnosticKind::ToolchainMissing;
        }

        if !signal.vanished_sources.is_empty() || RESOURCE_PATTERNS.is_match(&signal.output) {
            return DiagnosticKind::ResourcePathMissing;
        }

        DiagnosticKind::BackendCompileFailure
    }

    /// One-line description of a classified failure.
    pub fn describe(&self, kind: DiagnosticKind, signal: &FailureSignal) -> String {
        match kind {
            DiagnosticKind::Interrupted => format!("{} build was interrupted", self.backend),
            DiagnosticKind::ToolchainMissing => match signal.spawn_error {
                Some(_) => format!("could not start the {} backend: {}", self.backend, signal.output),
                None => format!("{} backend is not available", self.backend),
            },
            DiagnosticKind::RuntimeDependencyMissing => {
                "artifact was built but cannot load a shared runtime library".to_string()
            }
            DiagnosticKind::ResourcePathMissing => match signal.vanished_sources.as_slice() {
                [] => "a declared data file was not found by the backend".to_string(),
                sources => format!(
                    "data source `{}` disappeared during the build",
                    sources
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join("`, `")
                ),
            },
            DiagnosticKind::BackendCompileFailure if signal.artifact_missing => format!(
                "{} finished without producing the expected artifact",
                self.backend
            ),
            DiagnosticKind::BackendCompileFailure if signal.smoke_failure.is_some() => {
                "artifact was built but its smoke check failed".to_string()
            }
            DiagnosticKind::BackendCompileFailure => match signal.exit_code {
                Some(code) => format!("{} failed with exit code {}", self.backend, code),
                None => format!("{} terminated abnormally", self.backend),
            },
            DiagnosticKind::ConfigInvalid => "invalid build configuration".to_string(),
            DiagnosticKind::UnsupportedOption => {
                format!("option not supported by the {} backend", self.backend)
            }
            DiagnosticKind::TargetBusy => "output directory is in use by another build".to_string(),
        }
    }

    /// Remediation steps for a kind, adapted to the backend.
    pub fn suggestions(&self, kind: DiagnosticKind) -> Vec<&'static str> {
        let install = match self.backend {
            BackendId::Performance => suggestions::INSTALL_NUITKA,
            BackendId::Bundle => suggestions::INSTALL_PYINSTALLER,
        };

        match kind {
            DiagnosticKind::ToolchainMissing => {
                let mut steps = vec![install];
                if self.backend == BackendId::Performance {
                    steps.push(suggestions::INSTALL_C_COMPILER);
                }
                steps.push(suggestions::CHECK_PYTHON);
                steps.push(suggestions::RUN_DOCTOR);
                steps
            }
            DiagnosticKind::ResourcePathMissing => vec![suggestions::CHECK_RESOURCES],
            DiagnosticKind::RuntimeDependencyMissing => {
                let mut steps = vec![suggestions::VC_REDIST];
                if self.backend == BackendId::Bundle {
                    steps.push(suggestions::HIDDEN_IMPORT);
                }
                steps.push(suggestions::DEBUG_BUILD);
                steps
            }
            DiagnosticKind::BackendCompileFailure => vec![
                suggestions::INSTALL_REQUIREMENTS,
                install,
                suggestions::DEBUG_BUILD,
                suggestions::VERBOSE_BUILD,
            ],
            DiagnosticKind::ConfigInvalid => Vec::new(),
            DiagnosticKind::UnsupportedOption => {
                vec!["Drop the option, or select the other backend with `--backend`"]
            }
            DiagnosticKind::TargetBusy => vec![suggestions::TARGET_BUSY],
            DiagnosticKind::Interrupted => vec![suggestions::CLEAN_REBUILD],
        }
    }
}
