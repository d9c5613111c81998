//! Performance backend shim - compiles the application with Nuitka.
//!
//! Supports single-file output and parallel compilation. Icons are rejected.

use std::path::PathBuf;

use crate::builder::context::BuildContext;
use crate::builder::invocation::BackendInvocation;
use crate::builder::shim::capabilities::{
    BackendCapabilities, BackendCapabilitiesBuilder, BackendId,
};
use crate::builder::shim::trait_def::{
    artifact_name, check_supported, BackendShim, UnsupportedOptionError,
};
use crate::core::{BuildConfig, MappingSeparator};

/// Environment variable Nuitka reads its cache location from.
pub const CACHE_DIR_ENV: &str = "NUITKA_CACHE_DIR";

/// Nuitka backend shim.
pub struct PerformanceBackend {
    capabilities: BackendCapabilities,
}

impl PerformanceBackend {
    /// Create a new Nuitka backend shim.
    pub fn new() -> Self {
        PerformanceBackend {
            capabilities: Self::build_capabilities(),
        }
    }

    fn build_capabilities() -> BackendCapabilities {
        BackendCapabilitiesBuilder::new(BackendId::Performance, MappingSeparator::Equals)
            .single_file(true)
            .parallelism(true)
            .icon(false)
            .bundles_runtime(false)
            .build()
    }

    /// Arguments emitted for every build.
    fn policy_args(&self, ctx: &BuildContext) -> Vec<String> {
        vec![
            "--standalone".to_string(),
            "--follow-imports".to_string(),
            format!(
                "--output-dir={}",
                ctx.output_dir_or(self.default_output_dir()).display()
            ),
        ]
    }

    /// Arguments translated from the config.
    ///
    /// Order: console, single-file, exclusions, inclusions, data, jobs, debug,
    /// output name.
    fn option_args(&self, config: &BuildConfig, ctx: &BuildContext) -> Vec<String> {
        let mut args = Vec::new();

        if config.hide_console {
            args.push("--windows-disable-console".to_string());
        }

        if config.single_file {
            args.push("--onefile".to_string());
        }

        // BTreeSet iterates sorted
        for module in &config.excluded_modules {
            args.push(format!("--nofollow-import-to={}", module));
        }

        for module in &config.included_modules {
            args.push(format!("--include-package={}", module));
        }

        for mapping in &config.data_includes {
            let flag = if ctx.resolve(mapping.source()).is_dir() {
                "--include-data-dir"
            } else {
                "--include-data-files"
            };
            args.push(format!(
                "{}={}",
                flag,
                mapping.to_token(self.capabilities.data_separator)
            ));
        }

        if let Some(jobs) = config.parallelism {
            args.push(format!("--jobs={}", jobs));
        }

        if config.debug {
            args.push("--debug".to_string());
        }

        if let Some(ref name) = config.output_name {
            args.push(format!("--output-filename={}", name));
        }

        args
    }

    fn env(&self, ctx: &BuildContext) -> Vec<(String, String)> {
        ctx.cache_dir
            .as_ref()
            .map(|dir| {
                vec![(
                    CACHE_DIR_ENV.to_string(),
                    ctx.resolve(dir).display().to_string(),
                )]
            })
            .unwrap_or_default()
    }

    fn expected_artifact(&self, config: &BuildConfig, ctx: &BuildContext) -> PathBuf {
        let out = self.output_dir(ctx);
        let exe = format!("{}{}", artifact_name(config, ctx), std::env::consts::EXE_SUFFIX);

        if config.single_file {
            out.join(exe)
        } else {
            out.join(format!("{}.dist", ctx.entry_stem())).join(exe)
        }
    }
}

impl Default for PerformanceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendShim for PerformanceBackend {
    fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    fn default_output_dir(&self) -> &'static str {
        "dist"
    }

    fn translate(
        &self,
        config: &BuildConfig,
        ctx: &BuildContext,
    ) -> Result<BackendInvocation, UnsupportedOptionError> {
        check_supported(self, config)?;

        let invocation = BackendInvocation {
            backend: self.id(),
            program: ctx.python.clone(),
            launcher: vec!["-m".to_string(), self.id().module().to_string()],
            policy: self.policy_args(ctx),
            options: self.option_args(config, ctx),
            entry: ctx.entry.clone(),
            cwd: ctx.project_root.clone(),
            env: self.env(ctx),
            output_dir: self.output_dir(ctx),
            expected_artifact: self.expected_artifact(config, ctx),
        };

        tracing::debug!("Nuitka invocation: {}", invocation.display_command());
        Ok(invocation)
    }

    fn artifact_paths(&self, config: &BuildConfig, ctx: &BuildContext) -> Vec<PathBuf> {
        let out = self.output_dir(ctx);
        let stem = ctx.entry_stem();
        vec![
            out.join(format!("{}.dist", stem)),
            out.join(format!("{}.build", stem)),
            out.join(format!("{}.onefile-build", stem)),
            out.join(format!(
                "{}{}",
                artifact_name(config, ctx),
                std::env::consts::EXE_SUFFIX
            )),
        ]
    }

    fn install_hint(&self) -> &'static str {
        "Install Nuitka: pip install nuitka --upgrade"
    }
}
