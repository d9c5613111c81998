//! Backend capability types - hard constraints on what backends can express.
//!
//! Capabilities are immutable facts about backends, not configuration.
//! Backend policy (default exclusions, output layout) lives in the shims.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::mapping::MappingSeparator;

/// Unique identifier for a packaging backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendId {
    /// Compiling backend (Nuitka)
    #[serde(rename = "nuitka", alias = "performance")]
    Performance,
    /// Bundling backend (PyInstaller)
    #[serde(rename = "pyinstaller", alias = "bundle")]
    Bundle,
}

impl BackendId {
    /// All known backends.
    pub const ALL: [BackendId; 2] = [BackendId::Performance, BackendId::Bundle];

    /// Get the backend name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Performance => "nuitka",
            BackendId::Bundle => "pyinstaller",
        }
    }

    /// Python module that implements the backend (`python -m <module>`).
    pub fn module(&self) -> &'static str {
        match self {
            BackendId::Performance => "nuitka",
            BackendId::Bundle => "PyInstaller",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendId {
    type Err = BackendIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nuitka" | "performance" => Ok(BackendId::Performance),
            "pyinstaller" | "bundle" => Ok(BackendId::Bundle),
            _ => Err(BackendIdParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid backend ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendIdParseError(pub String);

impl fmt::Display for BackendIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid backend '{}', valid values: nuitka, pyinstaller",
            self.0
        )
    }
}

impl std::error::Error for BackendIdParseError {}

/// A user-facing field of [`BuildConfig`](crate::core::BuildConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigField {
    OutputName,
    HideConsole,
    SingleFile,
    ExcludedModules,
    IncludedModules,
    DataIncludes,
    IconPath,
    Debug,
    Parallelism,
}

impl ConfigField {
    /// Stable field name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigField::OutputName => "outputName",
            ConfigField::HideConsole => "hideConsole",
            ConfigField::SingleFile => "singleFile",
            ConfigField::ExcludedModules => "excludedModules",
            ConfigField::IncludedModules => "includedModules",
            ConfigField::DataIncludes => "dataIncludes",
            ConfigField::IconPath => "iconPath",
            ConfigField::Debug => "debug",
            ConfigField::Parallelism => "parallelism",
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a backend can express.
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// Backend identifier
    pub id: BackendId,

    /// Config fields the backend can translate
    pub fields: Vec<ConfigField>,

    /// Separator used by the backend's data-mapping syntax
    pub data_separator: MappingSeparator,

    /// Whether the interpreter is always bundled into the artifact
    pub bundles_runtime: bool,
}

impl BackendCapabilities {
    /// Check if a config field can be expressed.
    pub fn supports(&self, field: ConfigField) -> bool {
        self.fields.contains(&field)
    }
}

/// Builder for [`BackendCapabilities`].
pub struct BackendCapabilitiesBuilder {
    caps: BackendCapabilities,
}

impl BackendCapabilitiesBuilder {
    /// Start with the fields every backend supports.
    pub fn new(id: BackendId, data_separator: MappingSeparator) -> Self {
        BackendCapabilitiesBuilder {
            caps: BackendCapabilities {
                id,
                fields: vec![
                    ConfigField::OutputName,
                    ConfigField::HideConsole,
                    ConfigField::ExcludedModules,
                    ConfigField::IncludedModules,
                    ConfigField::DataIncludes,
                    ConfigField::Debug,
                ],
                data_separator,
                bundles_runtime: false,
            },
        }
    }

    pub fn single_file(self, supported: bool) -> Self {
        self.field(ConfigField::SingleFile, supported)
    }

    pub fn parallelism(self, supported: bool) -> Self {
        self.field(ConfigField::Parallelism, supported)
    }

    pub fn icon(self, supported: bool) -> Self {
        self.field(ConfigField::IconPath, supported)
    }

    pub fn bundles_runtime(mut self, always: bool) -> Self {
        self.caps.bundles_runtime = always;
        self
    }

    fn field(mut self, field: ConfigField, supported: bool) -> Self {
        if supported && !self.caps.fields.contains(&field) {
            self.caps.fields.push(field);
        } else if !supported {
            self.caps.fields.retain(|f| *f != field);
        }
        self
    }

    pub fn build(mut self) -> BackendCapabilities {
        self.caps.fields.sort();
        self.caps
    }
}
