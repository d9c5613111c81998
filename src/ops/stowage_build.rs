//! Implementation of `stowage build`: the build orchestrator.
//!
//! One [`BuildOrchestrator`] drives exactly one build through
//! `Idle → [Cleaning] → Validating → Translating → Invoking → Reporting`
//! and ends in `Done` or `Failed`. Every failure ends up as a
//! [`BuildDiagnostic`]; the orchestrator never retries.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use miette::Diagnostic as MietteDiagnostic;

use crate::builder::diagnostics::{DiagnosticKind, DiagnosticsClassifier, FailureSignal};
use crate::builder::events::{BuildEvent, BuildState};
use crate::builder::shim::{BackendShim, UnsupportedOptionError};
use crate::builder::{BackendInvocation, BuildContext};
use crate::core::{effective_mappings, BuildConfig, ConfigError, MappingError, PathMappingParser};
use crate::ops::clean::remove_artifacts;
use crate::util::diagnostic::Diagnostic;
use crate::util::lock::{LockError, TargetLock};
use crate::util::process::{CancelToken, ProcessBuilder, ProcessOutput, ProcessRunner};

/// Final status of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Failed,
}

/// Structured description of a failed build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDiagnostic {
    pub kind: DiagnosticKind,
    /// One-line summary
    pub message: String,
    /// Individual problems, when there are several
    pub details: Vec<String>,
    /// Remediation steps
    pub suggestions: Vec<String>,
    /// Captured backend output, verbatim
    pub output: Option<String>,
}

impl BuildDiagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        BuildDiagnostic {
            kind,
            message: message.into(),
            details: Vec::new(),
            suggestions: Vec::new(),
            output: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions.extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        let output = output.into();
        if !output.trim().is_empty() {
            self.output = Some(output);
        }
        self
    }

    /// Last `lines` lines of the captured backend output.
    pub fn output_tail(&self, lines: usize) -> Option<String> {
        let output = self.output.as_deref()?;
        let all: Vec<&str> = output.lines().collect();
        let start = all.len().saturating_sub(lines);
        Some(all[start..].join("\n"))
    }

    /// Render for the terminal.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let mut diag = Diagnostic::error(format!("{} [{}]", self.message, self.kind));
        for detail in &self.details {
            diag = diag.with_context(detail.clone());
        }
        for suggestion in &self.suggestions {
            diag = diag.with_suggestion(suggestion.clone());
        }
        diag
    }

    fn from_config_error(err: &ConfigError) -> Self {
        let errors: Vec<&ConfigError> = match err {
            ConfigError::Multiple(errors) => errors.iter().collect(),
            single => vec![single],
        };

        let mut diag = match errors.as_slice() {
            [single] => BuildDiagnostic::new(DiagnosticKind::ConfigInvalid, single.to_string()),
            _ => {
                let mut diag = BuildDiagnostic::new(DiagnosticKind::ConfigInvalid, err.to_string());
                for e in &errors {
                    diag = diag.with_detail(e.to_string());
                }
                diag
            }
        };
        for e in errors {
            if let Some(help) = e.help() {
                diag.suggestions.push(help.to_string());
            }
        }
        diag
    }

    fn from_mapping_error(err: &MappingError) -> Self {
        let mut diag = BuildDiagnostic::new(DiagnosticKind::ConfigInvalid, err.to_string());
        if let Some(help) = err.help() {
            diag.suggestions.push(help.to_string());
        }
        diag
    }
}

/// Outcome of one build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub status: BuildStatus,
    /// Produced artifact, set only on `Success`
    pub artifact_path: Option<PathBuf>,
    /// Set only when `Failed`
    pub diagnostic: Option<BuildDiagnostic>,
    /// Translated invocation, if translation was reached
    pub invocation: Option<BackendInvocation>,
    /// Every state the orchestrator entered, in order
    pub trace: Vec<BuildState>,
    pub duration: Duration,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }

    /// Failure kind, if the build failed.
    pub fn kind(&self) -> Option<DiagnosticKind> {
        self.diagnostic.as_ref().map(|d| d.kind)
    }

    /// Folder holding the artifact and its support files, when the artifact
    /// sits in one below the output directory (standalone and bundle builds).
    pub fn distribution_dir(&self) -> Option<&Path> {
        let output_dir = &self.invocation.as_ref()?.output_dir;
        let dir = self.artifact_path.as_deref()?.parent()?;
        (dir != output_dir.as_path() && dir.starts_with(output_dir)).then_some(dir)
    }
}

type Observer<'a> = Box<dyn FnMut(&BuildEvent) + 'a>;

/// Drives a single build against one backend.
pub struct BuildOrchestrator<'a> {
    backend: &'a dyn BackendShim,
    ctx: BuildContext,
    runner: &'a dyn ProcessRunner,
    classifier: DiagnosticsClassifier,
    cancel: CancelToken,
    smoke_check: Option<Vec<String>>,
    observer: Option<Observer<'a>>,
    state: BuildState,
    trace: Vec<BuildState>,
    invocation: Option<BackendInvocation>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(backend: &'a dyn BackendShim, ctx: BuildContext, runner: &'a dyn ProcessRunner) -> Self {
        BuildOrchestrator {
            backend,
            ctx,
            runner,
            classifier: DiagnosticsClassifier::new(backend.id()),
            cancel: CancelToken::new(),
            smoke_check: None,
            observer: None,
            state: BuildState::Idle,
            trace: vec![BuildState::Idle],
            invocation: None,
        }
    }

    /// Token that terminates the backend process when cancelled.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the artifact with `args` after a successful build.
    pub fn with_smoke_check(mut self, args: Vec<String>) -> Self {
        self.smoke_check = Some(args);
        self
    }

    /// Receive every [`BuildEvent`] as it happens.
    pub fn with_observer(mut self, observer: impl FnMut(&BuildEvent) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Validate and translate without touching the output directory.
    pub fn plan(&self, config: &BuildConfig) -> Result<BackendInvocation, BuildDiagnostic> {
        self.validate(config)?;
        self.translate(config)
    }

    /// Run the build. Single-shot: the orchestrator is consumed.
    pub fn run(mut self, config: &BuildConfig) -> BuildResult {
        let start = Instant::now();
        let output_dir = self.backend.output_dir(&self.ctx);
        self.emit(BuildEvent::started(self.backend.id(), &output_dir));

        let _lock = match TargetLock::acquire(&output_dir) {
            Ok(lock) => lock,
            Err(LockError::Busy(busy)) => {
                let mut diag = BuildDiagnostic::new(DiagnosticKind::TargetBusy, busy.to_string())
                    .with_suggestions(self.classifier.suggestions(DiagnosticKind::TargetBusy));
                if let Some(ref holder) = busy.holder {
                    diag = diag.with_detail(format!("lock held by {}", holder));
                }
                return self.fail(start, diag.with_detail(busy.lock_path.display().to_string()));
            }
            Err(e) => {
                let diag = BuildDiagnostic::new(DiagnosticKind::BackendCompileFailure, e.to_string());
                return self.fail(start, diag);
            }
        };

        if config.clean {
            self.transition(BuildState::Cleaning);
            if let Err(e) = remove_artifacts(&self.backend.artifact_paths(config, &self.ctx)) {
                let diag = BuildDiagnostic::new(
                    DiagnosticKind::BackendCompileFailure,
                    "failed to clean previous artifacts",
                )
                .with_detail(format!("{:#}", e));
                return self.fail(start, diag);
            }
        }

        self.transition(BuildState::Validating);
        if let Err(diag) = self.validate(config) {
            return self.fail(start, diag);
        }
        self.warn_shadowed_mappings(config);

        self.transition(BuildState::Translating);
        let invocation = match self.translate(config) {
            Ok(invocation) => invocation,
            Err(diag) => return self.fail(start, diag),
        };
        self.invocation = Some(invocation.clone());

        self.transition(BuildState::Invoking);
        self.emit(BuildEvent::invocation(&invocation));
        tracing::debug!("Running {}", invocation.display_command());
        let outcome = self.runner.run(&invocation.to_process(), &self.cancel);

        self.transition(BuildState::Reporting);
        match self.report(config, &invocation, outcome) {
            Ok(artifact) => self.succeed(start, artifact),
            Err(diag) => self.fail(start, diag),
        }
    }

    fn validate(&self, config: &BuildConfig) -> Result<(), BuildDiagnostic> {
        let caps = self.backend.capabilities();
        let root = &self.ctx.project_root;

        let mut errors = Vec::new();
        if !self.ctx.resolve(&self.ctx.entry).is_file() {
            errors.push(ConfigError::EntryNotFound {
                path: self.ctx.entry.clone(),
            });
        }
        match config.validate(caps, root) {
            Ok(()) => {}
            Err(ConfigError::Multiple(more)) => errors.extend(more),
            Err(e) => errors.push(e),
        }
        if !errors.is_empty() {
            return Err(BuildDiagnostic::from_config_error(&ConfigError::multiple(errors)));
        }

        PathMappingParser::new(caps.data_separator, root)
            .normalize(&config.data_includes)
            .map(|_| ())
            .map_err(|e| BuildDiagnostic::from_mapping_error(&e))
    }

    fn translate(&self, config: &BuildConfig) -> Result<BackendInvocation, BuildDiagnostic> {
        self.backend.translate(config, &self.ctx).map_err(|e: UnsupportedOptionError| {
            BuildDiagnostic::new(DiagnosticKind::UnsupportedOption, e.to_string())
                .with_suggestions(self.classifier.suggestions(DiagnosticKind::UnsupportedOption))
        })
    }

    fn warn_shadowed_mappings(&mut self, config: &BuildConfig) {
        let effective = effective_mappings(&config.data_includes);
        if effective.len() == config.data_includes.len() {
            return;
        }
        for mapping in &config.data_includes {
            if !effective.iter().any(|m| std::ptr::eq(*m, mapping)) {
                let message = format!(
                    "data mapping `{}` is overridden by a later mapping to the same destination",
                    mapping.source().display()
                );
                tracing::warn!("{}", message);
                self.emit(BuildEvent::warning(message));
            }
        }
    }

    /// Decide the outcome of the backend run.
    fn report(
        &self,
        config: &BuildConfig,
        invocation: &BackendInvocation,
        outcome: std::io::Result<ProcessOutput>,
    ) -> Result<PathBuf, BuildDiagnostic> {
        let output = match outcome {
            Ok(output) => output,
            Err(e) => return Err(self.diagnose(FailureSignal::spawn_failed(&e))),
        };

        if !output.success() {
            let mut signal = FailureSignal::from_output(&output);
            if !output.interrupted {
                signal = signal.with_vanished_sources(self.vanished_sources(config));
                if self.classifier.classify(&signal) == DiagnosticKind::BackendCompileFailure {
                    let check_failed = !self.backend.availability(self.runner, &self.ctx).is_available();
                    signal = signal.with_toolchain_check_failed(check_failed);
                }
            }
            return Err(self.diagnose(signal));
        }

        let artifact = invocation.expected_artifact.clone();
        if !artifact.exists() {
            let signal = FailureSignal::from_output(&output)
                .with_artifact_missing(true)
                .with_vanished_sources(self.vanished_sources(config));
            return Err(self
                .diagnose(signal)
                .with_detail(format!("expected {}", artifact.display())));
        }

        if let Some(ref args) = self.smoke_check {
            self.smoke_check(&artifact, args)?;
        }

        Ok(artifact)
    }

    fn smoke_check(&self, artifact: &Path, args: &[String]) -> Result<(), BuildDiagnostic> {
        let mut process = ProcessBuilder::new(artifact).args(args);
        if let Some(parent) = artifact.parent() {
            process = process.cwd(parent);
        }
        tracing::info!("Smoke check: {}", process.display_command());

        let signal = match self.runner.run(&process, &self.cancel) {
            Ok(output) if output.success() => return Ok(()),
            Ok(output) => FailureSignal {
                interrupted: output.interrupted,
                exit_code: output.exit_code,
                ..FailureSignal::default()
            }
            .with_smoke_failure(output.combined()),
            Err(e) => FailureSignal::default().with_smoke_failure(e.to_string()),
        };

        let output = signal.smoke_failure.clone().unwrap_or_default();
        Err(self.diagnose(signal).with_output(output))
    }

    fn vanished_sources(&self, config: &BuildConfig) -> Vec<PathBuf> {
        config
            .data_includes
            .iter()
            .filter(|m| !self.ctx.resolve(m.source()).exists())
            .map(|m| m.source().to_path_buf())
            .collect()
    }

    fn diagnose(&self, signal: FailureSignal) -> BuildDiagnostic {
        let kind = self.classifier.classify(&signal);
        BuildDiagnostic::new(kind, self.classifier.describe(kind, &signal))
            .with_suggestions(self.classifier.suggestions(kind))
            .with_output(signal.output)
    }

    fn transition(&mut self, to: BuildState) {
        tracing::debug!("build state: {} -> {}", self.state, to);
        let from = std::mem::replace(&mut self.state, to);
        self.trace.push(to);
        self.emit(BuildEvent::transition(from, to));
    }

    fn emit(&mut self, event: BuildEvent) {
        if let Some(ref mut observer) = self.observer {
            observer(&event);
        }
    }

    fn succeed(mut self, start: Instant, artifact: PathBuf) -> BuildResult {
        self.transition(BuildState::Done);
        let duration = start.elapsed();
        self.emit(BuildEvent::finished(
            true,
            duration.as_millis() as u64,
            Some(artifact.clone()),
        ));

        BuildResult {
            status: BuildStatus::Success,
            artifact_path: Some(artifact),
            diagnostic: None,
            invocation: self.invocation,
            trace: self.trace,
            duration,
        }
    }

    fn fail(mut self, start: Instant, diagnostic: BuildDiagnostic) -> BuildResult {
        tracing::debug!("build failed in {}: {}", self.state, diagnostic.message);
        self.transition(BuildState::Failed);
        self.emit(BuildEvent::error(diagnostic.kind, diagnostic.message.clone()));
        let duration = start.elapsed();
        self.emit(BuildEvent::finished(false, duration.as_millis() as u64, None));

        BuildResult {
            status: BuildStatus::Failed,
            artifact_path: None,
            diagnostic: Some(diagnostic),
            invocation: self.invocation,
            trace: self.trace,
            duration,
        }
    }
}
