//! Configuration file support for Stowage.
//!
//! Stowage supports two configuration file locations:
//! - Global: `~/.stowage/config.toml` - User-wide defaults
//! - Project: `.stowage/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::shim::{BackendId, BackendIdParseError};
use crate::core::{BuildConfig, PathMapping};

/// Stowage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings shared by every backend
    pub build: BuildSection,

    /// Nuitka settings
    pub nuitka: NuitkaSection,

    /// PyInstaller settings
    pub pyinstaller: PyInstallerSection,
}

/// Backend-agnostic build settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Default backend (nuitka, pyinstaller)
    pub backend: Option<String>,

    /// Python interpreter
    pub python: Option<PathBuf>,

    /// Entry script
    pub entry: Option<PathBuf>,

    /// Executable name
    pub output_name: Option<String>,

    pub hide_console: Option<bool>,

    pub single_file: Option<bool>,

    pub debug: Option<bool>,

    /// Parallel compile jobs
    pub jobs: Option<usize>,

    /// Modules to exclude
    pub exclude: Vec<String>,

    /// Modules to force-include
    pub include: Vec<String>,

    pub icon: Option<PathBuf>,

    /// Data files, in application order
    pub data: Vec<DataEntry>,
}

/// One `[[build.data]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Nuitka-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NuitkaSection {
    pub output_dir: Option<PathBuf>,

    /// Compilation cache directory
    pub cache_dir: Option<PathBuf>,
}

/// PyInstaller-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PyInstallerSection {
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Lists are replaced, not concatenated.
    pub fn merge(&mut self, other: Config) {
        let build = other.build;
        if build.backend.is_some() {
            self.build.backend = build.backend;
        }
        if build.python.is_some() {
            self.build.python = build.python;
        }
        if build.entry.is_some() {
            self.build.entry = build.entry;
        }
        if build.output_name.is_some() {
            self.build.output_name = build.output_name;
        }
        if build.hide_console.is_some() {
            self.build.hide_console = build.hide_console;
        }
        if build.single_file.is_some() {
            self.build.single_file = build.single_file;
        }
        if build.debug.is_some() {
            self.build.debug = build.debug;
        }
        if build.jobs.is_some() {
            self.build.jobs = build.jobs;
        }
        if !build.exclude.is_empty() {
            self.build.exclude = build.exclude;
        }
        if !build.include.is_empty() {
            self.build.include = build.include;
        }
        if build.icon.is_some() {
            self.build.icon = build.icon;
        }
        if !build.data.is_empty() {
            self.build.data = build.data;
        }

        if other.nuitka.output_dir.is_some() {
            self.nuitka.output_dir = other.nuitka.output_dir;
        }
        if other.nuitka.cache_dir.is_some() {
            self.nuitka.cache_dir = other.nuitka.cache_dir;
        }
        if other.pyinstaller.output_dir.is_some() {
            self.pyinstaller.output_dir = other.pyinstaller.output_dir;
        }
    }

    /// Configured backend, if any. An unknown name is an error.
    pub fn backend(&self) -> std::result::Result<Option<BackendId>, BackendIdParseError> {
        self.build.backend.as_deref().map(str::parse).transpose()
    }

    /// Configured output directory for a backend.
    pub fn output_dir(&self, backend: BackendId) -> Option<PathBuf> {
        match backend {
            BackendId::Performance => self.nuitka.output_dir.clone(),
            BackendId::Bundle => self.pyinstaller.output_dir.clone(),
        }
    }

    /// Configured cache directory for a backend.
    pub fn cache_dir(&self, backend: BackendId) -> Option<PathBuf> {
        match backend {
            BackendId::Performance => self.nuitka.cache_dir.clone(),
            BackendId::Bundle => None,
        }
    }

    /// Build request described by the `[build]` section.
    pub fn to_build_config(&self) -> BuildConfig {
        let build = &self.build;
        let mut config = BuildConfig::new()
            .with_hide_console(build.hide_console.unwrap_or(false))
            .with_single_file(build.single_file.unwrap_or(false))
            .with_debug(build.debug.unwrap_or(false))
            .with_parallelism(build.jobs);

        config.output_name = build.output_name.clone();
        config.icon_path = build.icon.clone();
        config.excluded_modules.extend(build.exclude.iter().cloned());
        config.included_modules.extend(build.include.iter().cloned());
        config.data_includes = build
            .data
            .iter()
            .map(|d| PathMapping::new(&d.source, &d.dest))
            .collect();
        config
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.stowage/config.toml)
/// 2. Global config (~/.stowage/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}
