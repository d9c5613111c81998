//! Backend-native invocation produced by a shim.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::shim::BackendId;
use crate::util::process::ProcessBuilder;

/// Translated command line for one build, plus the artifact it should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendInvocation {
    /// Backend that produced this invocation
    pub backend: BackendId,

    /// Interpreter used to launch the backend
    pub program: PathBuf,

    /// Arguments selecting the backend module (`-m nuitka`)
    pub launcher: Vec<String>,

    /// Arguments the backend always emits, independent of the config
    pub policy: Vec<String>,

    /// Arguments translated from the build config, in deterministic order
    pub options: Vec<String>,

    /// Entry script, always the final argument
    pub entry: PathBuf,

    /// Working directory of the backend process
    pub cwd: PathBuf,

    /// Extra environment for the backend process
    pub env: Vec<(String, String)>,

    /// Output directory (absolute)
    pub output_dir: PathBuf,

    /// Artifact that must exist after a successful build (absolute)
    pub expected_artifact: PathBuf,
}

impl BackendInvocation {
    /// Full argument sequence after the program.
    pub fn argv(&self) -> Vec<String> {
        self.launcher
            .iter()
            .chain(&self.policy)
            .chain(&self.options)
            .cloned()
            .chain(std::iter::once(self.entry.display().to_string()))
            .collect()
    }

    /// Build the process for this invocation.
    pub fn to_process(&self) -> ProcessBuilder {
        let mut process = ProcessBuilder::new(&self.program)
            .args(self.argv())
            .cwd(&self.cwd);
        for (key, value) in &self.env {
            process = process.env(key, value);
        }
        process
    }

    /// Display the command line.
    pub fn display_command(&self) -> String {
        self.to_process().display_command()
    }
}
