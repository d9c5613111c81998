//! `stowage build` command

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use miette::Diagnostic as MietteDiagnostic;

use crate::cli::BuildArgs;
use stowage::builder::shim::BackendShim;
use stowage::builder::{BuildEvent, BuildState};
use stowage::core::{BuildConfig, MappingError, PathMappingParser};
use stowage::ops::{BuildDiagnostic, BuildOrchestrator};
use stowage::util::diagnostic::{emit, Diagnostic};
use stowage::util::process::{CancelToken, SystemRunner};
use stowage::util::shell::{format_duration, Shell, Spinner, Status};
use stowage::util::{Config, GlobalContext};
use stowage::BackendRegistry;

/// Lines of backend output shown after a failure.
const OUTPUT_TAIL_LINES: usize = 30;

pub fn execute(args: BuildArgs, shell: &Arc<Shell>) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let settings = gctx.load_config();
    let registry = BackendRegistry::new();

    let (shim, mut ctx) = super::resolve_target(&registry, &gctx, &settings, &args.target)?;
    if args.cache_dir.is_some() {
        ctx = ctx.with_cache_dir(args.cache_dir.clone());
    }

    let config = match build_config(&args, &settings, shim, gctx.cwd()) {
        Ok(config) => config,
        Err(e) => {
            let mut diag = Diagnostic::error(e.to_string());
            if let Some(help) = e.help() {
                diag = diag.with_suggestion(help.to_string());
            }
            report(shell, &diag);
            std::process::exit(1);
        }
    };

    let runner = SystemRunner;

    if args.plan {
        let orchestrator = BuildOrchestrator::new(shim, ctx, &runner);
        match orchestrator.plan(&config) {
            Ok(invocation) => {
                if shell.is_json() {
                    shell.json_event(&invocation);
                } else {
                    shell.print(invocation.display_command());
                }
                return Ok(());
            }
            Err(diag) => {
                report_failure(shell, &diag);
                std::process::exit(1);
            }
        }
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        tracing::warn!("failed to install interrupt handler: {}", e);
    }

    let mut orchestrator = BuildOrchestrator::new(shim, ctx, &runner)
        .with_cancel_token(cancel)
        .with_observer(observer(Arc::clone(shell), shim.id().to_string()));
    if args.smoke_check {
        orchestrator = orchestrator.with_smoke_check(args.smoke_arg.clone());
    }

    let result = orchestrator.run(&config);

    if let Some(artifact) = &result.artifact_path {
        shell.status(
            Status::Finished,
            format!("{} in {}", artifact.display(), format_duration(result.duration)),
        );
        if let Some(dir) = result.distribution_dir() {
            shell.note(format!("distribution folder {}", dir.display()));
        }
        return Ok(());
    }

    // JSON mode already streamed the diagnostic event
    if let (Some(diag), false) = (&result.diagnostic, shell.is_json()) {
        report_failure(shell, diag);
    }
    std::process::exit(1);
}

/// Merge config files and flags into a build request.
///
/// Flags win; list flags replace the configured lists. Mapping syntax is
/// checked here with the selected backend's separator.
fn build_config(
    args: &BuildArgs,
    settings: &Config,
    shim: &dyn BackendShim,
    root: &Path,
) -> Result<BuildConfig, MappingError> {
    let mut config = settings.to_build_config();

    if let Some(ref name) = args.target.output_name {
        config.output_name = Some(name.clone());
    }
    config.hide_console |= args.no_console;
    config.single_file |= args.onefile;
    config.debug |= args.debug;
    config.clean = args.clean;
    if args.jobs.is_some() {
        config.parallelism = args.jobs;
    }
    if args.icon.is_some() {
        config.icon_path = args.icon.clone();
    }
    if !args.exclude.is_empty() {
        config.excluded_modules = args.exclude.iter().cloned().collect();
    }
    if !args.include.is_empty() {
        config.included_modules = args.include.iter().cloned().collect();
    }
    if !args.include_data.is_empty() {
        let parser = PathMappingParser::new(shim.capabilities().data_separator, root);
        config.data_includes = args
            .include_data
            .iter()
            .map(|raw| parser.split(raw))
            .collect::<Result<_, _>>()?;
    }

    Ok(config)
}

/// Forward orchestrator events to the shell.
fn observer(shell: Arc<Shell>, backend: String) -> impl FnMut(&BuildEvent) {
    let mut spinner: Option<Spinner> = None;

    move |event: &BuildEvent| {
        if shell.is_json() {
            shell.json_event(event);
            return;
        }

        match event {
            BuildEvent::StateChanged { to, .. } => match to {
                BuildState::Cleaning => shell.status(Status::Cleaning, "previous artifacts"),
                BuildState::Invoking => {
                    spinner = Some(shell.spinner(Status::Packaging, format!("with {}", backend)));
                }
                _ => {
                    if let Some(s) = spinner.take() {
                        s.clear();
                    }
                }
            },
            BuildEvent::Invocation { command, .. } => {
                if shell.is_verbose() {
                    shell.note(command.join(" "));
                }
            }
            BuildEvent::Diagnostic {
                level, message, ..
            } if level == "warning" => shell.warn(message),
            _ => {}
        }
    }
}

fn report_failure(shell: &Shell, diag: &BuildDiagnostic) {
    if shell.is_json() {
        shell.json_event(&BuildEvent::error(diag.kind, diag.message.clone()));
        return;
    }

    report(shell, &diag.to_diagnostic());
    if let Some(tail) = diag.output_tail(OUTPUT_TAIL_LINES) {
        eprintln!("\nbackend output (last {} lines):", OUTPUT_TAIL_LINES);
        eprintln!("{}", tail);
    }
}

fn report(shell: &Shell, diag: &Diagnostic) {
    if shell.is_json() {
        shell.error(&diag.message);
    } else {
        emit(diag, shell.use_color());
    }
}
