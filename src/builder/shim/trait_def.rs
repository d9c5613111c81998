//! BackendShim trait definition and shared result types.
//!
//! A shim translates a [`BuildConfig`] into backend-native arguments. Shims
//! never spawn the build themselves; the orchestrator does.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::context::BuildContext;
use crate::builder::invocation::BackendInvocation;
use crate::builder::shim::capabilities::{BackendCapabilities, BackendId, ConfigField};
use crate::core::BuildConfig;
use crate::util::process::{CancelToken, ProcessBuilder, ProcessRunner};
use crate::util::version::parse_version_flexible;

/// A config field the backend cannot express at all.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
#[error("option `{field}` is not supported by the {backend} backend")]
#[diagnostic(code(stowage::backend::unsupported_option))]
pub struct UnsupportedOptionError {
    pub field: ConfigField,
    pub backend: BackendId,
}

/// Backend availability status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendAvailability {
    /// Backend module is importable
    Available {
        /// Detected version of the backend
        version: semver::Version,
    },

    /// Backend (or its interpreter) is not installed
    NotInstalled {
        /// Name of the missing tool (e.g., "nuitka")
        tool: String,
        /// Hint for how to install
        install_hint: String,
    },
}

impl BackendAvailability {
    /// Check if the backend is available.
    pub fn is_available(&self) -> bool {
        matches!(self, BackendAvailability::Available { .. })
    }

    /// Get error message if not available.
    pub fn error_message(&self) -> Option<String> {
        match self {
            BackendAvailability::Available { .. } => None,
            BackendAvailability::NotInstalled { tool, install_hint } => {
                Some(format!("{} not found. {}", tool, install_hint))
            }
        }
    }
}

/// Interface every packaging backend implements.
pub trait BackendShim: Send + Sync {
    /// Get the backend's capabilities.
    fn capabilities(&self) -> &BackendCapabilities;

    /// Backend identifier.
    fn id(&self) -> BackendId {
        self.capabilities().id
    }

    /// Check whether a config field can be expressed.
    fn supports(&self, field: ConfigField) -> bool {
        self.capabilities().supports(field)
    }

    /// Output directory used when the context does not override it.
    fn default_output_dir(&self) -> &'static str;

    /// Translate a config into a backend invocation.
    ///
    /// Deterministic: the same config and context always produce the same
    /// argument sequence.
    fn translate(
        &self,
        config: &BuildConfig,
        ctx: &BuildContext,
    ) -> Result<BackendInvocation, UnsupportedOptionError>;

    /// Paths owned by this backend that a clean build removes.
    fn artifact_paths(&self, config: &BuildConfig, ctx: &BuildContext) -> Vec<PathBuf>;

    /// Install hint shown when the backend is missing.
    fn install_hint(&self) -> &'static str;

    /// Absolute output directory for a build.
    fn output_dir(&self, ctx: &BuildContext) -> PathBuf {
        ctx.resolve(&ctx.output_dir_or(self.default_output_dir()))
    }

    /// Process that prints the backend version.
    fn version_command(&self, ctx: &BuildContext) -> ProcessBuilder {
        ProcessBuilder::new(&ctx.python)
            .args(["-m", self.id().module(), "--version"])
            .cwd(&ctx.project_root)
    }

    /// Extract the version from the version command's stdout.
    fn parse_version(&self, stdout: &str) -> Option<semver::Version> {
        stdout.lines().find_map(parse_version_flexible)
    }

    /// Detect whether the backend can run in this environment.
    fn availability(&self, runner: &dyn ProcessRunner, ctx: &BuildContext) -> BackendAvailability {
        let not_installed = || BackendAvailability::NotInstalled {
            tool: self.id().as_str().to_string(),
            install_hint: self.install_hint().to_string(),
        };

        match runner.run(&self.version_command(ctx), &CancelToken::new()) {
            Ok(output) if output.success() => match self.parse_version(&output.stdout) {
                Some(version) => BackendAvailability::Available { version },
                None => {
                    tracing::debug!(
                        "could not parse {} version from `{}`",
                        self.id(),
                        output.stdout.trim()
                    );
                    not_installed()
                }
            },
            Ok(output) => {
                tracing::debug!("{} version check failed: {}", self.id(), output.stderr.trim());
                not_installed()
            }
            Err(e) => {
                tracing::debug!("{} version check could not start: {}", self.id(), e);
                not_installed()
            }
        }
    }
}

/// Name of the produced executable: the configured name or the entry stem.
pub fn artifact_name(config: &BuildConfig, ctx: &BuildContext) -> String {
    config
        .output_name
        .clone()
        .unwrap_or_else(|| ctx.entry_stem())
}

/// Fail with [`UnsupportedOptionError`] for the first set field the backend cannot express.
pub fn check_supported(
    shim: &dyn BackendShim,
    config: &BuildConfig,
) -> Result<(), UnsupportedOptionError> {
    match config.set_fields().into_iter().find(|f| !shim.supports(*f)) {
        Some(field) => Err(UnsupportedOptionError {
            field,
            backend: shim.id(),
        }),
        None => Ok(()),
    }
}
