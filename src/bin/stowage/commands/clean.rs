//! `stowage clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanArgs;
use stowage::ops::clean;
use stowage::util::shell::{Shell, Status};
use stowage::util::GlobalContext;
use stowage::BackendRegistry;

pub fn execute(args: CleanArgs, shell: &Arc<Shell>) -> Result<()> {
    let gctx = GlobalContext::new()?;
    let settings = gctx.load_config();
    let registry = BackendRegistry::new();

    let (shim, ctx) = super::resolve_target(&registry, &gctx, &settings, &args.target)?;

    // Artifact names depend on the configured executable name
    let mut config = settings.to_build_config();
    if let Some(ref name) = args.target.output_name {
        config.output_name = Some(name.clone());
    }

    let report = clean(shim, &config, &ctx)?;

    if report.is_empty() {
        shell.status(Status::Skipped, format!("no {} artifacts to remove", shim.id()));
    }
    for path in &report.removed {
        shell.status(Status::Removed, path.display());
    }
    shell.json_event(&serde_json::json!({
        "reason": "clean-finished",
        "backend": shim.id(),
        "removed": report.removed,
    }));

    Ok(())
}
