//! Test utilities and mocks for Stowage unit tests.
//!
//! The main piece is [`MockExecutor`], a [`ProcessRunner`] that answers
//! commands from a list of expectations instead of spawning processes. An
//! expectation can also touch the filesystem when it fires, which stands in
//! for a backend writing (or failing to find) files.
//!
//! # Example
//!
//! ```rust,ignore
//! use stowage::test_support::{MockExecutor, MockProcessOutput};
//!
//! let mut exec = MockExecutor::new();
//! exec.expect("python3 -m nuitka --version", MockProcessOutput::success("2.4.8"));
//! ```

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{bail, Result};

use crate::util::process::{CancelToken, ProcessBuilder, ProcessOutput, ProcessRunner};

/// Mock process output for testing command execution.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Fail to spawn with this error kind instead of producing output.
    pub spawn_error: Option<io::ErrorKind>,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            spawn_error: None,
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            spawn_error: None,
        }
    }

    /// Create an output with both stdout and stderr.
    pub fn with_output(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
            spawn_error: None,
        }
    }

    /// The program cannot be started.
    pub fn spawn_failure(kind: io::ErrorKind) -> Self {
        MockProcessOutput {
            spawn_error: Some(kind),
            ..MockProcessOutput::default()
        }
    }

    fn to_result(&self) -> io::Result<ProcessOutput> {
        match self.spawn_error {
            Some(kind) => Err(io::Error::new(kind, "mock spawn failure")),
            None => Ok(ProcessOutput {
                exit_code: Some(self.status),
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
                interrupted: false,
            }),
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching commands in MockExecutor.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match using a regex pattern.
    Regex(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(cmd))
                .unwrap_or(false),
            CommandPattern::Any => true,
        }
    }
}

/// Expectation for a command execution.
#[derive(Debug, Clone)]
pub struct CommandExpectation {
    /// Pattern to match against commands.
    pub pattern: CommandPattern,
    /// Output to return when matched.
    pub output: MockProcessOutput,
    /// Number of times this expectation can be used (None = unlimited).
    pub times: Option<usize>,
    /// Number of times this expectation has been used.
    pub used: usize,
    /// Files written when the expectation fires.
    pub creates: Vec<PathBuf>,
    /// Paths deleted when the expectation fires.
    pub removes: Vec<PathBuf>,
}

impl CommandExpectation {
    /// Create a new expectation.
    pub fn new(pattern: CommandPattern, output: MockProcessOutput) -> Self {
        CommandExpectation {
            pattern,
            output,
            times: None,
            used: 0,
            creates: Vec::new(),
            removes: Vec::new(),
        }
    }

    /// Set the number of times this expectation can be used.
    pub fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Write an empty file (and its parents) when matched.
    pub fn creates(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    /// Delete a file or directory when matched.
    pub fn removes(mut self, path: impl Into<PathBuf>) -> Self {
        self.removes.push(path.into());
        self
    }

    /// Check if this expectation can still be used.
    pub fn available(&self) -> bool {
        match self.times {
            Some(n) => self.used < n,
            None => true,
        }
    }

    fn apply_side_effects(&self) -> io::Result<()> {
        for path in &self.creates {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, b"")?;
        }
        for path in &self.removes {
            if path.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

/// Mock process executor for testing command execution.
///
/// Records every command and answers from the first available matching
/// expectation. A cancelled token short-circuits to an interrupted output.
#[derive(Debug, Default)]
pub struct MockExecutor {
    expectations: Mutex<Vec<CommandExpectation>>,
    calls: Mutex<Vec<String>>,
    default_output: Option<MockProcessOutput>,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an expectation for an exact command match.
    pub fn expect(&mut self, cmd: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Exact(cmd.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command starting with a prefix.
    pub fn expect_prefix(&mut self, prefix: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::StartsWith(prefix.to_string()),
            output,
        ))
    }

    /// Add an expectation for a command containing a substring.
    pub fn expect_contains(&mut self, substring: &str, output: MockProcessOutput) -> &mut Self {
        self.expect_pattern(CommandExpectation::new(
            CommandPattern::Contains(substring.to_string()),
            output,
        ))
    }

    /// Add a custom expectation.
    pub fn expect_pattern(&mut self, expectation: CommandExpectation) -> &mut Self {
        self.expectations
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .push(expectation);
        self
    }

    /// Set a default output for commands that don't match any expectation.
    pub fn set_default(&mut self, output: MockProcessOutput) -> &mut Self {
        self.default_output = Some(output);
        self
    }

    /// Get all commands that were called.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Verify that all expectations with a specific count were satisfied.
    pub fn verify(&self) -> Result<()> {
        let expectations = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
        for (i, exp) in expectations.iter().enumerate() {
            if let Some(expected) = exp.times {
                if exp.used != expected {
                    bail!(
                        "expectation {} was used {} times, expected {}",
                        i,
                        exp.used,
                        expected
                    );
                }
            }
        }
        Ok(())
    }
}

impl ProcessRunner for MockExecutor {
    fn run(&self, process: &ProcessBuilder, cancel: &CancelToken) -> io::Result<ProcessOutput> {
        let full_cmd = process.display_command();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(full_cmd.clone());

        if cancel.is_cancelled() {
            return Ok(ProcessOutput {
                exit_code: None,
                interrupted: true,
                ..ProcessOutput::default()
            });
        }

        let mut expectations = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(exp) = expectations
            .iter_mut()
            .find(|exp| exp.pattern.matches(&full_cmd) && exp.available())
        {
            exp.used += 1;
            exp.apply_side_effects()?;
            return exp.output.to_result();
        }

        if let Some(ref default) = self.default_output {
            return default.to_result();
        }

        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("unexpected command: {}", full_cmd),
        ))
    }
}

/// Create a temporary project containing an entry script.
///
/// Returns the TempDir handle - dropping it will clean up the directory.
pub fn create_test_project(entry: &str) -> tempfile::TempDir {
    let tmp = tempfile::TempDir::new().expect("failed to create temp dir");
    let entry_path = tmp.path().join(entry);
    if let Some(parent) = entry_path.parent() {
        std::fs::create_dir_all(parent).expect("failed to create entry dir");
    }
    std::fs::write(&entry_path, minimal_entry_script()).expect("failed to write entry script");
    tmp
}

/// Minimal Python entry script.
pub fn minimal_entry_script() -> &'static str {
    "def main():\n    print(\"hello from stowage\")\n\n\nif __name__ == \"__main__\":\n    main()\n"
}

/// Assert that a path exists on disk.
pub fn assert_path_exists(path: impl AsRef<Path>) {
    let path = path.as_ref();
    assert!(path.exists(), "expected path to exist: {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pb(cmd: &str) -> ProcessBuilder {
        let mut parts = cmd.split(' ');
        ProcessBuilder::new(parts.next().unwrap()).args(parts)
    }

    #[test]
    fn test_mock_executor_basic() {
        let mut exec = MockExecutor::new();
        exec.expect("python3 -m nuitka --version", MockProcessOutput::success("2.4.8"));
        exec.expect_prefix("python3 -m PyInstaller", MockProcessOutput::failure(1, "boom"));

        let out = exec
            .run(&pb("python3 -m nuitka --version"), &CancelToken::new())
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "2.4.8");

        let out = exec
            .run(&pb("python3 -m PyInstaller main.py"), &CancelToken::new())
            .unwrap();
        assert_eq!(out.exit_code, Some(1));

        assert_eq!(exec.calls().len(), 2);
    }

    #[test]
    fn test_mock_executor_unexpected() {
        let exec = MockExecutor::new();
        assert!(exec.run(&pb("unknown"), &CancelToken::new()).is_err());
    }

    #[test]
    fn test_mock_executor_side_effects() {
        let tmp = create_test_project("main.py");
        let artifact = tmp.path().join("dist/main.dist/main");

        let mut exec = MockExecutor::new();
        exec.expect_pattern(
            CommandExpectation::new(CommandPattern::Any, MockProcessOutput::success(""))
                .times(1)
                .creates(&artifact)
                .removes(tmp.path().join("main.py")),
        );

        exec.run(&pb("python3 build"), &CancelToken::new()).unwrap();
        assert_path_exists(&artifact);
        assert!(!tmp.path().join("main.py").exists());
        exec.verify().unwrap();
    }

    #[test]
    fn test_mock_executor_cancelled() {
        let mut exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::success(""));
        let cancel = CancelToken::new();
        cancel.cancel();

        let out = exec.run(&pb("python3 build"), &cancel).unwrap();
        assert!(out.interrupted);
        assert!(!out.success());
    }

    #[test]
    fn test_spawn_failure() {
        let mut exec = MockExecutor::new();
        exec.set_default(MockProcessOutput::spawn_failure(io::ErrorKind::NotFound));

        let err = exec.run(&pb("python3"), &CancelToken::new()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
