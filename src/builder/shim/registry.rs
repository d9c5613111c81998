//! Backend registry - lookup of the built-in packaging backends.
//!
//! Key principle: Registry construction never fails. Backend availability
//! is checked lazily when the backend is actually needed.

use std::collections::HashMap;

use crate::builder::context::BuildContext;
use crate::builder::shim::bundle::BundleBackend;
use crate::builder::shim::capabilities::{BackendId, ConfigField};
use crate::builder::shim::performance::PerformanceBackend;
use crate::builder::shim::trait_def::{BackendAvailability, BackendShim};
use crate::util::process::ProcessRunner;

/// Registry of packaging backends.
///
/// The registry always constructs successfully - it registers all built-in
/// backends without checking if they're actually installed.
pub struct BackendRegistry {
    backends: HashMap<BackendId, Box<dyn BackendShim>>,
}

impl BackendRegistry {
    /// Create a new registry with all built-in backends.
    pub fn new() -> Self {
        let mut registry = BackendRegistry {
            backends: HashMap::new(),
        };

        registry.register(Box::new(PerformanceBackend::new()));
        registry.register(Box::new(BundleBackend::new()));

        registry
    }

    /// Register a backend shim, replacing any shim with the same ID.
    pub fn register(&mut self, shim: Box<dyn BackendShim>) {
        self.backends.insert(shim.id(), shim);
    }

    /// Get a backend by ID.
    pub fn get(&self, id: BackendId) -> Option<&dyn BackendShim> {
        self.backends.get(&id).map(|b| b.as_ref())
    }

    /// Get all registered backends in [`BackendId::ALL`] order.
    pub fn all(&self) -> impl Iterator<Item = &dyn BackendShim> + '_ {
        BackendId::ALL.into_iter().filter_map(|id| self.get(id))
    }

    /// Check if a backend is registered.
    pub fn contains(&self, id: BackendId) -> bool {
        self.backends.contains_key(&id)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a backend for display purposes.
#[derive(Debug, Clone)]
pub struct BackendSummary {
    /// Backend identifier
    pub id: BackendId,

    /// Availability status
    pub availability: BackendAvailability,

    /// Brief description
    pub description: &'static str,

    /// Whether a single self-contained executable can be produced
    pub single_file: bool,

    /// Whether the interpreter is always bundled
    pub bundles_runtime: bool,
}

impl BackendSummary {
    /// Create a summary from a backend shim. Runs the version check.
    pub fn from_shim(shim: &dyn BackendShim, runner: &dyn ProcessRunner, ctx: &BuildContext) -> Self {
        let caps = shim.capabilities();
        let description = match caps.id {
            BackendId::Performance => "Compiles to C with Nuitka",
            BackendId::Bundle => "Bundles bytecode and interpreter with PyInstaller",
        };

        BackendSummary {
            id: caps.id,
            availability: shim.availability(runner, ctx),
            description,
            single_file: caps.supports(ConfigField::SingleFile),
            bundles_runtime: caps.bundles_runtime,
        }
    }
}

/// Get summaries for every registered backend.
pub fn get_backend_summaries(
    registry: &BackendRegistry,
    runner: &dyn ProcessRunner,
    ctx: &BuildContext,
) -> Vec<BackendSummary> {
    registry
        .all()
        .map(|shim| BackendSummary::from_shim(shim, runner, ctx))
        .collect()
}
