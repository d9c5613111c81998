//! Build context: where a packaging build runs and what it packages.

use std::path::{Path, PathBuf};

use crate::util::fs::resolve_path;
use crate::util::process::default_python;

/// Environment of a single build, independent of the chosen backend.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Project root; working directory of the backend process
    pub project_root: PathBuf,

    /// Python interpreter used to launch the backend
    pub python: PathBuf,

    /// Application entry script, relative to the project root
    pub entry: PathBuf,

    /// Output directory override (backend default when `None`)
    pub output_dir: Option<PathBuf>,

    /// Backend compilation cache directory
    pub cache_dir: Option<PathBuf>,
}

impl BuildContext {
    /// Create a new build context with the default interpreter and `main.py`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        BuildContext {
            project_root: project_root.into(),
            python: PathBuf::from(default_python()),
            entry: PathBuf::from("main.py"),
            output_dir: None,
            cache_dir: None,
        }
    }

    /// Set the Python interpreter.
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    /// Set the entry script.
    pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
        self.entry = entry.into();
        self
    }

    /// Override the output directory.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the cache directory.
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Output directory as passed to the backend (may be relative).
    pub fn output_dir_or(&self, default: &str) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(default))
    }

    /// Resolve a project-relative path.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        resolve_path(&self.project_root, path)
    }

    /// File stem of the entry script (`main` for `main.py`).
    pub fn entry_stem(&self) -> String {
        self.entry
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = BuildContext::new("/project");
        assert_eq!(ctx.entry, PathBuf::from("main.py"));
        assert_eq!(ctx.entry_stem(), "main");
        assert_eq!(ctx.output_dir_or("dist"), PathBuf::from("dist"));
    }

    #[test]
    fn test_overrides() {
        let ctx = BuildContext::new("/project")
            .with_entry("app/launcher.py")
            .with_output_dir(Some(PathBuf::from("build/out")));
        assert_eq!(ctx.entry_stem(), "launcher");
        assert_eq!(ctx.output_dir_or("dist"), PathBuf::from("build/out"));
        assert_eq!(
            ctx.resolve(Path::new("build/out")),
            PathBuf::from("/project/build/out")
        );
    }
}
