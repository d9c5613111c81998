//! Bundle backend shim - packages the application with PyInstaller.
//!
//! Output is always a one-folder bundle. Single-file output and job counts are
//! rejected.

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

/// Module excluded from every bundle.
///
/// The project's `config` package holds machine-local settings that must not
/// ship inside a distribution.
pub const POLICY_EXCLUDED_MODULE: &str = "config";

/// PyInstaller backend shim.
pub struct BundleBackend {
    capabilities: BackendCapabilities,
}

impl BundleBackend {
    /// Create a new PyInstaller backend shim.
    pub fn new() -> Self {
        BundleBackend {
            capabilities: Self::build_capabilities(),
        }
    }

    fn build_capabilities() -> BackendCapabilities {
        BackendCapabilitiesBuilder::new(BackendId::Bundle, MappingSeparator::Semicolon)
            .single_file(false)
            .parallelism(false)
            .icon(true)
            .bundles_runtime(true)
            .build()
    }

    fn policy_args(&self, config: &BuildConfig, ctx: &BuildContext) -> Vec<String> {
        let out = ctx.output_dir_or(self.default_output_dir());
        let mut args = vec![
            "--noconfirm".to_string(),
            "--distpath".to_string(),
            out.display().to_string(),
            "--workpath".to_string(),
            out.join("build").display().to_string(),
            "--log-level".to_string(),
            "INFO".to_string(),
        ];

        // Clears PyInstaller's own cache; our artifact cleaning happens earlier
        if config.clean {
            args.push("--clean".to_string());
        }

        args
    }

    fn option_args(&self, config: &BuildConfig) -> Vec<String> {
        let mut args = Vec::new();

        args.push(if config.hide_console {
            "--windowed".to_string()
        } else {
            "--console".to_string()
        });

        if let Some(ref icon) = config.icon_path {
            args.push("--icon".to_string());
            args.push(icon.display().to_string());
        }

        let policy_exclusion = (!config.excluded_modules.contains(POLICY_EXCLUDED_MODULE))
            .then_some(POLICY_EXCLUDED_MODULE);
        for module in config
            .excluded_modules
            .iter()
            .map(String::as_str)
            .chain(policy_exclusion)
        {
            args.push("--exclude-module".to_string());
            args.push(module.to_string());
        }

        for module in &config.included_modules {
            args.push("--hidden-import".to_string());
            args.push(module.clone());
        }

        for mapping in &config.data_includes {
            args.push("--add-data".to_string());
            args.push(mapping.to_token(self.capabilities.data_separator));
        }

        if config.debug {
            args.push("--debug=all".to_string());
        }

        if let Some(ref name) = config.output_name {
            args.push("--name".to_string());
            args.push(name.clone());
        }

        args
    }
}

impl Default for BundleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendShim for BundleBackend {
    fn capabilities(&self) -> &BackendCapabilities {
        &self.capabilities
    }

    fn default_output_dir(&self) -> &'static str {
        "dist_pyins"
    }

    fn translate(
        &self,
        config: &BuildConfig,
        ctx: &BuildContext,
    ) -> Result<BackendInvocation, UnsupportedOptionError> {
        check_supported(self, config)?;

        let out = self.output_dir(ctx);
        let name = artifact_name(config, ctx);
        let expected_artifact = out
            .join(&name)
            .join(format!("{}{}", name, std::env::consts::EXE_SUFFIX));

        let invocation = BackendInvocation {
            backend: self.id(),
            program: ctx.python.clone(),
            launcher: vec!["-m".to_string(), self.id().module().to_string()],
            policy: self.policy_args(config, ctx),
            options: self.option_args(config),
            entry: ctx.entry.clone(),
            cwd: ctx.project_root.clone(),
            env: Vec::new(),
            output_dir: out,
            expected_artifact,
        };

        tracing::debug!("PyInstaller invocation: {}", invocation.display_command());
        Ok(invocation)
    }

    fn artifact_paths(&self, config: &BuildConfig, ctx: &BuildContext) -> Vec<PathBuf> {
        let out = self.output_dir(ctx);
        let name = artifact_name(config, ctx);
        vec![
            out.join(&name),
            out.join("build"),
            ctx.project_root.join(format!("{}.spec", name)),
        ]
    }

    fn install_hint(&self) -> &'static str {
        "Install PyInstaller: pip install pyinstaller --upgrade"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::shim::capabilities::ConfigField;
    use crate::core::PathMapping;
    use tempfile::TempDir;

    fn ctx(root: &std::path::Path) -> BuildContext {
        BuildContext::new(root).with_python("python3")
    }

    fn exclusions(options: &[String]) -> Vec<&str> {
        options
            .windows(2)
            .filter(|w| w[0] == "--exclude-module")
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn test_policy_exclusion_always_appended() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_excluded_module("pandas");

        let inv = BundleBackend::new()
            .translate(&config, &ctx(tmp.path()))
            .unwrap();
        assert_eq!(exclusions(&inv.options), vec!["pandas", "config"]);
    }

    #[test]
    fn test_policy_exclusion_not_duplicated() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new()
            .with_excluded_module("config")
            .with_excluded_module("tkinter");

        let inv = BundleBackend::new()
            .translate(&config, &ctx(tmp.path()))
            .unwrap();
        assert_eq!(exclusions(&inv.options), vec!["config", "tkinter"]);
    }

    #[test]
    fn test_full_option_order() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new()
            .with_output_name("MaiLauncher")
            .with_hide_console(true)
            .with_icon("icon.ico")
            .with_excluded_module("pandas")
            .with_included_module("flet")
            .with_data_include(PathMapping::new("assets", "assets"))
            .with_data_include(PathMapping::new("ui/theme.json", "ui"))
            .with_debug(true);

        let inv = BundleBackend::new()
            .translate(&config, &ctx(tmp.path()))
            .unwrap();
        assert_eq!(
            inv.options,
            vec![
                "--windowed",
                "--icon",
                "icon.ico",
                "--exclude-module",
                "pandas",
                "--exclude-module",
                "config",
                "--hidden-import",
                "flet",
                "--add-data",
                "assets;assets",
                "--add-data",
                "ui/theme.json;ui",
                "--debug=all",
                "--name",
                "MaiLauncher",
            ]
        );
    }

    #[test]
    fn test_policy_args() {
        let tmp = TempDir::new().unwrap();
        let shim = BundleBackend::new();

        let inv = shim.translate(&BuildConfig::new(), &ctx(tmp.path())).unwrap();
        assert_eq!(
            inv.policy,
            vec![
                "--noconfirm",
                "--distpath",
                "dist_pyins",
                "--workpath",
                "dist_pyins/build",
                "--log-level",
                "INFO",
            ]
        );
        assert_eq!(inv.options.first().map(String::as_str), Some("--console"));

        let inv = shim
            .translate(&BuildConfig::new().with_clean(true), &ctx(tmp.path()))
            .unwrap();
        assert_eq!(inv.policy.last().map(String::as_str), Some("--clean"));
    }

    #[test]
    fn test_single_file_fails_consistently() {
        let tmp = TempDir::new().unwrap();
        let shim = BundleBackend::new();
        let config = BuildConfig::new().with_single_file(true);

        for _ in 0..3 {
            let err = shim.translate(&config, &ctx(tmp.path())).unwrap_err();
            assert_eq!(err.field, ConfigField::SingleFile);
            assert_eq!(err.backend, BackendId::Bundle);
        }
    }

    #[test]
    fn test_translate_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new()
            .with_excluded_module("tkinter")
            .with_excluded_module("pandas")
            .with_included_module("flet")
            .with_data_include(PathMapping::new("b", "b"))
            .with_data_include(PathMapping::new("a", "a"));
        let shim = BundleBackend::new();
        let ctx = ctx(tmp.path());

        let first = shim.translate(&config, &ctx).unwrap().argv();
        for _ in 0..10 {
            assert_eq!(shim.translate(&config, &ctx).unwrap().argv(), first);
        }
    }

    #[test]
    fn test_parallelism_unsupported() {
        let tmp = TempDir::new().unwrap();
        let config = BuildConfig::new().with_parallelism(Some(8));

        let err = BundleBackend::new()
            .translate(&config, &ctx(tmp.path()))
            .unwrap_err();
        assert_eq!(err.field, ConfigField::Parallelism);
    }

    #[test]
    fn test_expected_artifact_and_clean_paths() {
        let tmp = TempDir::new().unwrap();
        let shim = BundleBackend::new();
        let ctx = ctx(tmp.path());
        let config = BuildConfig::new().with_output_name("App");

        let inv = shim.translate(&config, &ctx).unwrap();
        assert_eq!(
            inv.expected_artifact,
            tmp.path()
                .join("dist_pyins/App")
                .join(format!("App{}", std::env::consts::EXE_SUFFIX))
        );

        let paths = shim.artifact_paths(&config, &ctx);
        assert!(paths.contains(&tmp.path().join("dist_pyins/App")));
        assert!(paths.contains(&tmp.path().join("App.spec")));
        // Nuitka's output directory is never touched
        assert!(!paths.contains(&tmp.path().join("dist")));
    }
}
