//! Core data types: the packaging request and its data mappings.

pub mod build_config;
pub mod mapping;

pub use build_config::{BuildConfig, ConfigError, REQUIRED_RUNTIME_MODULES};
pub use mapping::{effective_mappings, MappingError, MappingSeparator, PathMapping, PathMappingParser};
