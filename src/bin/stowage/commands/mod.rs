//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod doctor;

use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::cli::TargetArgs;
use stowage::builder::shim::{BackendId, BackendRegistry, BackendShim};
use stowage::builder::BuildContext;
use stowage::util::{Config, GlobalContext};

/// Backend selected by flags, then config, then the default.
pub fn select_backend(flag: Option<BackendId>, config: &Config) -> BackendId {
    if let Some(id) = flag {
        return id;
    }
    match config.backend() {
        Ok(Some(id)) => id,
        Ok(None) => BackendId::Performance,
        Err(e) => {
            tracing::warn!("ignoring configured backend: {}", e);
            BackendId::Performance
        }
    }
}

/// Resolve the backend and build context for the current project.
///
/// Flags override the project config, which overrides the global config.
pub fn resolve_target<'r>(
    registry: &'r BackendRegistry,
    gctx: &GlobalContext,
    config: &Config,
    args: &TargetArgs,
) -> Result<(&'r dyn BackendShim, BuildContext)> {
    let id = select_backend(args.backend, config);
    let shim = registry
        .get(id)
        .ok_or_else(|| anyhow!("backend `{}` is not registered", id))?;

    let entry = args
        .entry
        .clone()
        .or_else(|| config.build.entry.clone())
        .unwrap_or_else(|| PathBuf::from("main.py"));

    let mut ctx = BuildContext::new(gctx.cwd())
        .with_entry(entry)
        .with_output_dir(args.output_dir.clone().or_else(|| config.output_dir(id)))
        .with_cache_dir(config.cache_dir(id));
    if let Some(python) = args.python.clone().or_else(|| config.build.python.clone()) {
        ctx = ctx.with_python(python);
    }

    Ok((shim, ctx))
}
