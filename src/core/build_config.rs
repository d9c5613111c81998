//! Canonical, backend-agnostic packaging request.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::builder::shim::capabilities::{BackendCapabilities, BackendId, ConfigField};
use crate::core::mapping::PathMapping;
use crate::util::fs::resolve_path;

/// Modules the packaged interpreter cannot start without.
///
/// Excluding one of these (or a submodule) always produces a broken artifact.
pub const REQUIRED_RUNTIME_MODULES: &[&str] = &[
    "abc",
    "codecs",
    "encodings",
    "importlib",
    "io",
    "os",
    "site",
    "sys",
];

/// Characters that are unsafe in an output file name on at least one platform.
const RESERVED_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// A single packaging request.
///
/// Built once by the caller and only read by the core.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildConfig {
    /// Name of the produced executable (defaults to the entry script stem)
    pub output_name: Option<String>,

    /// Build a windowed application without a console
    pub hide_console: bool,

    /// Remove previous artifacts before building
    pub clean: bool,

    /// Produce one self-contained executable
    pub single_file: bool,

    /// Modules the backend must not follow or bundle
    pub excluded_modules: BTreeSet<String>,

    /// Modules the backend must bundle even if no import is detected
    pub included_modules: BTreeSet<String>,

    /// Data files and directories to embed, in application order
    pub data_includes: Vec<PathMapping>,

    /// Application icon
    pub icon_path: Option<PathBuf>,

    /// Build with backend debugging enabled
    pub debug: bool,

    /// Parallel compile jobs passed through to the backend
    pub parallelism: Option<usize>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn with_hide_console(mut self, hide: bool) -> Self {
        self.hide_console = hide;
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_single_file(mut self, single_file: bool) -> Self {
        self.single_file = single_file;
        self
    }

    pub fn with_excluded_module(mut self, module: impl Into<String>) -> Self {
        self.excluded_modules.insert(module.into());
        self
    }

    pub fn with_included_module(mut self, module: impl Into<String>) -> Self {
        self.included_modules.insert(module.into());
        self
    }

    pub fn with_data_include(mut self, mapping: PathMapping) -> Self {
        self.data_includes.push(mapping);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon_path = Some(icon.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_parallelism(mut self, jobs: Option<usize>) -> Self {
        self.parallelism = jobs;
        self
    }

    /// Fields that carry a non-default value.
    pub fn set_fields(&self) -> Vec<ConfigField> {
        let mut fields = Vec::new();
        if self.output_name.is_some() {
            fields.push(ConfigField::OutputName);
        }
        if self.hide_console {
            fields.push(ConfigField::HideConsole);
        }
        if self.single_file {
            fields.push(ConfigField::SingleFile);
        }
        if !self.excluded_modules.is_empty() {
            fields.push(ConfigField::ExcludedModules);
        }
        if !self.included_modules.is_empty() {
            fields.push(ConfigField::IncludedModules);
        }
        if !self.data_includes.is_empty() {
            fields.push(ConfigField::DataIncludes);
        }
        if self.icon_path.is_some() {
            fields.push(ConfigField::IconPath);
        }
        if self.debug {
            fields.push(ConfigField::Debug);
        }
        if self.parallelism.is_some() {
            fields.push(ConfigField::Parallelism);
        }
        fields
    }

    /// Check the request against the backend's capabilities and the filesystem.
    ///
    /// Every violation is collected; relative paths resolve against `root`.
    pub fn validate(&self, caps: &BackendCapabilities, root: &Path) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if let Some(ref name) = self.output_name {
            if let Err(reason) = check_output_name(name) {
                errors.push(ConfigError::InvalidOutputName {
                    name: name.clone(),
                    reason,
                });
            }
        }

        if self.parallelism == Some(0) {
            errors.push(ConfigError::ZeroParallelism);
        }

        for module in self.excluded_modules.iter().chain(&self.included_modules) {
            if !is_module_name(module) {
                errors.push(ConfigError::InvalidModuleName {
                    module: module.clone(),
                });
            }
        }

        for module in &self.excluded_modules {
            if let Some(required) = required_module_for(module) {
                errors.push(ConfigError::RequiredModuleExcluded {
                    module: module.clone(),
                    required: required.to_string(),
                });
            }
            if self.included_modules.contains(module) {
                errors.push(ConfigError::ConflictingModule {
                    module: module.clone(),
                });
            }
        }

        if self.single_file && !caps.supports(ConfigField::SingleFile) {
            errors.push(ConfigError::SingleFileUnsupported { backend: caps.id });
        }

        for mapping in &self.data_includes {
            if !resolve_path(root, mapping.source()).exists() {
                errors.push(ConfigError::SourceNotFound {
                    path: mapping.source().to_path_buf(),
                });
            }
        }

        // Unsupported icons are reported as such during translation
        if let Some(ref icon) = self.icon_path {
            if caps.supports(ConfigField::IconPath) && !resolve_path(root, icon).exists() {
                errors.push(ConfigError::IconNotFound { path: icon.clone() });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::multiple(errors))
        }
    }
}

/// Invalid packaging request.
#[derive(Debug, Clone, PartialEq, Eq, Error, MietteDiagnostic)]
pub enum ConfigError {
    #[error("invalid output name `{name}`: {reason}")]
    #[diagnostic(code(stowage::config::output_name))]
    InvalidOutputName { name: String, reason: String },

    #[error("parallel job count must be at least 1")]
    #[diagnostic(code(stowage::config::jobs))]
    ZeroParallelism,

    #[error("`{module}` is not a valid module name")]
    #[diagnostic(code(stowage::config::module_name))]
    InvalidModuleName { module: String },

    #[error("excluding `{module}` would remove required runtime module `{required}`")]
    #[diagnostic(
        code(stowage::config::required_module),
        help("Remove `{module}` from the exclusion list")
    )]
    RequiredModuleExcluded { module: String, required: String },

    #[error("`{module}` is both included and excluded")]
    #[diagnostic(code(stowage::config::conflicting_module))]
    ConflictingModule { module: String },

    #[error("single-file output is not supported by the {backend} backend")]
    #[diagnostic(
        code(stowage::config::single_file),
        help("Drop --onefile, or build with --backend nuitka")
    )]
    SingleFileUnsupported { backend: BackendId },

    #[error("data source `{}` does not exist", .path.display())]
    #[diagnostic(code(stowage::config::source_not_found))]
    SourceNotFound { path: PathBuf },

    #[error("icon `{}` does not exist", .path.display())]
    #[diagnostic(code(stowage::config::icon_not_found))]
    IconNotFound { path: PathBuf },

    #[error("entry script `{}` does not exist", .path.display())]
    #[diagnostic(code(stowage::config::entry_not_found))]
    EntryNotFound { path: PathBuf },

    #[error("{} configuration errors", .0.len())]
    Multiple(Vec<ConfigError>),
}

impl ConfigError {
    /// Collapse a list of errors; a single error is returned as itself.
    pub fn multiple(mut errors: Vec<ConfigError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            ConfigError::Multiple(errors)
        }
    }

    /// Get all error messages.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ConfigError::Multiple(errors) => errors.iter().flat_map(|e| e.messages()).collect(),
            e => vec![e.to_string()],
        }
    }
}

fn check_output_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err("name refers to a directory".to_string());
    }
    if let Some(c) = name.chars().find(|c| RESERVED_NAME_CHARS.contains(c)) {
        return Err(format!("contains reserved character `{}`", c));
    }
    if name.chars().any(char::is_control) {
        return Err("contains control characters".to_string());
    }
    if name != name.trim() {
        return Err("has leading or trailing whitespace".to_string());
    }
    Ok(())
}

fn is_module_name(module: &str) -> bool {
    !module.is_empty()
        && module.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c == '_' || c.is_alphabetic())
                && chars.all(|c| c == '_' || c.is_alphanumeric())
        })
}

/// Required module that `module` would remove, if any.
fn required_module_for(module: &str) -> Option<&'static str> {
    REQUIRED_RUNTIME_MODULES.iter().copied().find(|required| {
        module == *required
            || module
                .strip_prefix(required)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::shim::{BundleBackend, PerformanceBackend};
    use crate::builder::shim::BackendShim;
    use tempfile::TempDir;

    fn nuitka_caps() -> BackendCapabilities {
        PerformanceBackend::new().capabilities().clone()
    }

    fn pyinstaller_caps() -> BackendCapabilities {
        BundleBackend::new().capabilities().clone()
    }

    #[test]
    fn test_default_config_is_valid() {
        let tmp = TempDir::new().unwrap();
        assert!(BuildConfig::new().validate(&nuitka_caps(), tmp.path()).is_ok());
        assert!(BuildConfig::new().validate(&pyinstaller_caps(), tmp.path()).is_ok());
    }

    #[test]
    fn test_output_name_must_be_safe() {
        let tmp = TempDir::new().unwrap();
        for bad in ["", "  ", "..", "a/b", "a\\b", "app?", " App"] {
            let config = BuildConfig::new().with_output_name(bad);
            let err = config.validate(&nuitka_caps(), tmp.path()).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidOutputName { .. }),
                "{:?} accepted",
                bad
            );
        }

        let ok = BuildConfig::new().with_output_name("MaiLuncher-1.2");
        assert!(ok.validate(&nuitka_caps(), tmp.path()).is_ok());
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_parallelism(Some(0));
        assert_eq!(
            config.validate(&nuitka_caps(), tmp.path()).unwrap_err(),
            ConfigError::ZeroParallelism
        );
    }

    #[test]
    fn test_required_module_exclusion_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_excluded_module("encodings.utf_8");
        let err = config.validate(&nuitka_caps(), tmp.path()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::RequiredModuleExcluded {
                module: "encodings.utf_8".to_string(),
                required: "encodings".to_string(),
            }
        );

        // Prefix without a dot boundary is a different module
        let config = BuildConfig::new().with_excluded_module("osmosis");
        assert!(config.validate(&nuitka_caps(), tmp.path()).is_ok());
    }

    #[test]
    fn test_self_defeating_exclusion_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new()
            .with_excluded_module("pandas")
            .with_included_module("pandas");
        assert!(matches!(
            config.validate(&pyinstaller_caps(), tmp.path()).unwrap_err(),
            ConfigError::ConflictingModule { .. }
        ));
    }

    #[test]
    fn test_invalid_module_name_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_excluded_module("not a module");
        assert!(matches!(
            config.validate(&nuitka_caps(), tmp.path()).unwrap_err(),
            ConfigError::InvalidModuleName { .. }
        ));
    }

    #[test]
    fn test_single_file_depends_on_backend() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_single_file(true);

        assert!(config.validate(&nuitka_caps(), tmp.path()).is_ok());
        assert_eq!(
            config.validate(&pyinstaller_caps(), tmp.path()).unwrap_err(),
            ConfigError::SingleFileUnsupported {
                backend: BackendId::Bundle
            }
        );
    }

    #[test]
    fn test_missing_data_source_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_data_include(PathMapping::new("data", "data"));
        assert_eq!(
            config.validate(&nuitka_caps(), tmp.path()).unwrap_err(),
            ConfigError::SourceNotFound {
                path: PathBuf::from("data")
            }
        );

        std::fs::create_dir(tmp.path().join("data")).unwrap();
        assert!(config.validate(&nuitka_caps(), tmp.path()).is_ok());
    }

    #[test]
    fn test_errors_are_collected() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new()
            .with_output_name("a/b")
            .with_parallelism(Some(0))
            .with_icon("missing.ico");

        let err = config.validate(&pyinstaller_caps(), tmp.path()).unwrap_err();
        match &err {
            ConfigError::Multiple(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected multiple errors, got {:?}", other),
        }
        assert_eq!(err.messages().len(), 3);
    }

    #[test]
    fn test_icon_checked_only_when_supported() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_icon("missing.ico");

        assert!(config.validate(&nuitka_caps(), tmp.path()).is_ok());
        assert_eq!(
            config.validate(&pyinstaller_caps(), tmp.path()),
            Err(ConfigError::IconNotFound {
                path: PathBuf::from("missing.ico")
            })
        );
    }

    #[test]
    fn test_set_fields() {
        let config = BuildConfig::new()
            .with_hide_console(true)
            .with_icon("icon.ico");
        assert_eq!(
            config.set_fields(),
            vec![ConfigField::HideConsole, ConfigField::IconPath]
        );
    }
}
