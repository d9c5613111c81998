//! Implementation of `stowage clean`.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::builder::shim::BackendShim;
use crate::builder::BuildContext;
use crate::core::BuildConfig;
use crate::util::fs::remove_path_if_exists;
use crate::util::lock::TargetLock;

/// Paths removed by a clean.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Paths that existed and were deleted
    pub removed: Vec<PathBuf>,
}

impl CleanReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Remove the given artifact paths. Missing paths are skipped.
pub fn remove_artifacts(paths: &[PathBuf]) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    for path in paths {
        if remove_path_if_exists(path)
            .with_context(|| format!("failed to clean {}", path.display()))?
        {
            tracing::debug!("Removed {}", path.display());
            report.removed.push(path.clone());
        }
    }
    Ok(report)
}

/// Remove the artifacts of one backend, holding its output directory lock.
///
/// Only the selected backend's paths are touched. Running it twice is a no-op
/// the second time.
pub fn clean(shim: &dyn BackendShim, config: &BuildConfig, ctx: &BuildContext) -> Result<CleanReport> {
    let output_dir = shim.output_dir(ctx);

    // Nothing can be building into a directory that does not exist
    let _lock = if output_dir.exists() {
        Some(TargetLock::acquire(&output_dir)?)
    } else {
        None
    };

    remove_artifacts(&shim.artifact_paths(config, ctx))
}
