//! Backend shim abstraction system.
//!
//! Each packaging backend declares which [`BuildConfig`](crate::core::BuildConfig)
//! fields it can express, and translates a config into a
//! [`BackendInvocation`](crate::builder::BackendInvocation). Translation is
//! pure: shims never spawn the build.
//!
//! # Architecture
//!
//! ```text
//!                  ┌─────────────────┐
//!                  │   BuildConfig   │ (user wants)
//!                  └────────┬────────┘
//!                           │ validate against capabilities
//!              ┌────────────┴────────────┐
//!              ▼                         ▼
//!     ┌──────────────────┐      ┌──────────────────┐
//!     │PerformanceBackend│      │  BundleBackend   │
//!     │     (Nuitka)     │      │  (PyInstaller)   │
//!     └────────┬─────────┘      └────────┬─────────┘
//!              └────────────┬────────────┘
//!                           ▼
//!                  ┌─────────────────┐
//!                  │BackendInvocation│ (argv + expected artifact)
//!                  └─────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Capabilities** - Hard constraints on what a backend can express (in `capabilities.rs`)
//! - **BackendShim** - Trait for backend implementations (in `trait_def.rs`)
//! - **Registry** - Backend lookup (in `registry.rs`)
//!
//! # Usage
//!
//! ```ignore
//! use stowage::builder::shim::{BackendId, BackendRegistry};
//!
//! let registry = BackendRegistry::new();
//! let nuitka = registry.get(BackendId::Performance).unwrap();
//! let invocation = nuitka.translate(&config, &ctx)?;
//! ```

pub mod bundle;
pub mod capabilities;
pub mod performance;
pub mod registry;
pub mod trait_def;

pub use capabilities::{
    BackendCapabilities, BackendCapabilitiesBuilder, BackendId, BackendIdParseError, ConfigField,
};

pub use trait_def::{
    artifact_name, check_supported, BackendAvailability, BackendShim, UnsupportedOptionError,
};

pub use registry::{get_backend_summaries, BackendRegistry, BackendSummary};

pub use bundle::{BundleBackend, POLICY_EXCLUDED_MODULE};
pub use performance::{PerformanceBackend, CACHE_DIR_ENV};
