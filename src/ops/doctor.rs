//! Environment and toolchain health checks.
//!
//! The `doctor` command performs fast environment checks to verify
//! that the interpreter and packaging backends are usable.
//!
//! ## Usage
//!
//! ```bash
//! stowage doctor           # Quick check
//! stowage doctor --verbose # Detailed output
//! ```
//!
//! ## Checks Performed
//!
//! - Python interpreter (`python --version`)
//! - Nuitka and PyInstaller (`python -m <backend> --version`)
//! - C compiler availability (cc, gcc, clang, cl), needed by Nuitka

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::builder::shim::{
    get_backend_summaries, BackendAvailability, BackendId, BackendRegistry, BackendSummary,
};
use crate::builder::BuildContext;
use crate::util::process::{find_c_compiler, CancelToken, ProcessBuilder, ProcessRunner};
use crate::util::version::parse_version_flexible;

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    /// Whether the check passed
    pub passed: bool,

    /// Human-readable status message
    pub message: String,

    /// Path to the tool (if applicable)
    pub path: Option<PathBuf>,

    /// Version string (if applicable)
    pub version: Option<String>,

    /// How long the check took
    pub duration: Duration,

    /// Whether this check is required or optional
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: false,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Set whether the check is required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Set the tool path.
    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,

    /// Total time taken
    pub total_duration: Duration,

    /// Environment information
    pub environment: HashMap<String, String>,
}

impl DoctorReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        DoctorReport {
            checks: Vec::new(),
            total_duration: Duration::ZERO,
            environment: HashMap::new(),
        }
    }

    /// Add a check result.
    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    /// Get the count of passed checks.
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get the count of failed checks.
    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    /// Get the count of required failed checks.
    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

impl Default for DoctorReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for the doctor command.
#[derive(Debug, Clone)]
pub struct DoctorOptions {
    /// Backend the project builds with; its checks are required
    pub backend: BackendId,
}

impl Default for DoctorOptions {
    fn default() -> Self {
        DoctorOptions {
            backend: BackendId::Performance,
        }
    }
}

/// Run the doctor command.
pub fn doctor(options: &DoctorOptions, ctx: &BuildContext, runner: &dyn ProcessRunner) -> DoctorReport {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    report
        .environment
        .insert("os".to_string(), std::env::consts::OS.to_string());
    report
        .environment
        .insert("arch".to_string(), std::env::consts::ARCH.to_string());
    report
        .environment
        .insert("python".to_string(), ctx.python.display().to_string());

    report.add(check_python(ctx, runner));

    let registry = BackendRegistry::new();
    for summary in get_backend_summaries(&registry, runner, ctx) {
        let required = summary.id == options.backend;
        report.add(check_backend(&summary).required(required));
    }

    report.add(check_c_compiler().required(options.backend == BackendId::Performance));

    report.total_duration = start.elapsed();
    report
}

/// Check the Python interpreter.
fn check_python(ctx: &BuildContext, runner: &dyn ProcessRunner) -> CheckResult {
    let start = Instant::now();
    let version = ProcessBuilder::new(&ctx.python).arg("--version");

    match runner.run(&version, &CancelToken::new()) {
        Ok(output) if output.success() => {
            // Python 2 printed the version to stderr
            let text = if output.stdout.trim().is_empty() {
                output.stderr
            } else {
                output.stdout
            };
            let line = text.lines().next().unwrap_or("").trim().to_string();
            let mut check = CheckResult::pass("Python", format!("Found {}", ctx.python.display()))
                .with_version(line.clone())
                .with_duration(start.elapsed());
            if let Ok(path) = which::which(&ctx.python) {
                check = check.with_path(path);
            }
            if line
                .strip_prefix("Python ")
                .and_then(parse_version_flexible)
                .is_some_and(|v| v.major < 3)
            {
                check.passed = false;
                check.message = format!("{} is not Python 3", ctx.python.display());
            }
            check
        }
        Ok(output) => CheckResult::fail(
            "Python",
            format!(
                "{} --version failed: {}",
                ctx.python.display(),
                output.stderr.trim()
            ),
        )
        .with_duration(start.elapsed()),
        Err(e) => CheckResult::fail(
            "Python",
            format!("{} not found: {}", ctx.python.display(), e),
        )
        .with_duration(start.elapsed()),
    }
}

/// Turn a backend summary (which already ran the version check) into a check.
fn check_backend(summary: &BackendSummary) -> CheckResult {
    let name = match summary.id {
        BackendId::Performance => "Nuitka",
        BackendId::Bundle => "PyInstaller",
    };

    match &summary.availability {
        BackendAvailability::Available { version } => {
            CheckResult::pass(name, summary.description).with_version(version.to_string())
        }
        unavailable => CheckResult::fail(
            name,
            unavailable
                .error_message()
                .unwrap_or_else(|| format!("{} not found", name)),
        ),
    }
}

/// Check for a C compiler.
fn check_c_compiler() -> CheckResult {
    let start = Instant::now();

    match find_c_compiler() {
        Some(path) => CheckResult::pass(
            "C Compiler",
            format!(
                "Found {}",
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            ),
        )
        .with_path(path)
        .with_duration(start.elapsed()),
        None => CheckResult::fail(
            "C Compiler",
            "No C compiler found (tried cc, gcc, clang, cl); Nuitka needs one",
        )
        .with_duration(start.elapsed()),
    }
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    use std::fmt::Write;

    let mut output = String::new();

    writeln!(output, "Stowage Doctor").unwrap();
    writeln!(output, "==============\n").unwrap();

    if verbose {
        let unknown = "unknown".to_string();
        writeln!(output, "Environment:").unwrap();
        writeln!(
            output,
            "  OS: {} ({})",
            report.environment.get("os").unwrap_or(&unknown),
            report.environment.get("arch").unwrap_or(&unknown)
        )
        .unwrap();
        writeln!(
            output,
            "  Interpreter: {}",
            report.environment.get("python").unwrap_or(&unknown)
        )
        .unwrap();
        writeln!(output).unwrap();
    }

    writeln!(output, "Checks:").unwrap();
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };

        writeln!(output, "  {} {}{}", status, check.name, required).unwrap();

        if verbose || (!check.passed && check.required) {
            writeln!(output, "      {}", check.message).unwrap();
        }
        if verbose {
            if let Some(path) = &check.path {
                writeln!(output, "      Path: {}", path.display()).unwrap();
            }
            if let Some(version) = &check.version {
                writeln!(output, "      Version: {}", version).unwrap();
            }
        }
    }

    writeln!(output).unwrap();

    let passed = report.passed_count();
    let failed = report.failed_count();
    let required_failed = report.required_failed_count();

    writeln!(output, "Summary: {} passed, {} failed", passed, failed).unwrap();

    if required_failed > 0 {
        writeln!(
            output,
            "\nWarning: {} required check(s) failed. Builds will likely fail.",
            required_failed
        )
        .unwrap();
    } else if failed > 0 {
        writeln!(
            output,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        )
        .unwrap();
    } else {
        writeln!(output, "\nAll checks passed. Stowage is ready to use.").unwrap();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockExecutor, MockProcessOutput};

    fn ctx() -> BuildContext {
        BuildContext::new("/project").with_python("python3")
    }

    #[test]
    fn test_check_result_optional() {
        let result = CheckResult::pass("test", "passed").optional();
        assert!(result.passed);
        assert!(!result.required);
    }

    #[test]
    fn test_doctor_report_required_failed() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("check1", "ok"));
        report.add(CheckResult::fail("check2", "missing"));
        report.add(CheckResult::fail("check3", "missing").optional());

        assert!(!report.all_required_passed());
        assert_eq!(report.required_failed_count(), 1);
        assert_eq!(report.failed_count(), 2);
    }

    #[test]
    fn test_doctor_selected_backend_is_required() {
        let mut runner = MockExecutor::new();
        runner
            .expect("python3 --version", MockProcessOutput::success("Python 3.12.4\n"))
            .expect("python3 -m nuitka --version", MockProcessOutput::failure(1, "No module named nuitka"))
            .expect("python3 -m PyInstaller --version", MockProcessOutput::success("6.10.0\n"));

        let options = DoctorOptions {
            backend: BackendId::Bundle,
        };
        let report = doctor(&options, &ctx(), &runner);

        let python = &report.checks[0];
        assert!(python.passed);
        assert_eq!(python.version.as_deref(), Some("Python 3.12.4"));

        let nuitka = report.checks.iter().find(|c| c.name == "Nuitka").unwrap();
        assert!(!nuitka.passed);
        assert!(!nuitka.required);
        assert!(nuitka.message.contains("pip install nuitka"));

        let pyinstaller = report.checks.iter().find(|c| c.name == "PyInstaller").unwrap();
        assert!(pyinstaller.passed);
        assert!(pyinstaller.required);
        assert_eq!(pyinstaller.version.as_deref(), Some("6.10.0"));

        let compiler = report.checks.iter().find(|c| c.name == "C Compiler").unwrap();
        assert!(!compiler.required);
    }

    #[test]
    fn test_missing_interpreter() {
        let mut runner = MockExecutor::new();
        runner.set_default(MockProcessOutput::spawn_failure(std::io::ErrorKind::NotFound));

        let report = doctor(&DoctorOptions::default(), &ctx(), &runner);
        assert!(!report.all_required_passed());
        assert!(!report.checks[0].passed);
    }

    #[test]
    fn test_python2_rejected() {
        let mut runner = MockExecutor::new();
        runner
            .expect("python3 --version", MockProcessOutput::with_output(0, "", "Python 2.7.18"))
            .set_default(MockProcessOutput::failure(1, ""));

        let report = doctor(&DoctorOptions::default(), &ctx(), &runner);
        assert!(!report.checks[0].passed);
    }

    #[test]
    fn test_format_report() {
        let mut report = DoctorReport::new();
        report.add(CheckResult::pass("Python", "Found python3").with_version("Python 3.12.4"));
        report.add(CheckResult::fail("PyInstaller", "PyInstaller not found").optional());

        let text = format_report(&report, false);
        assert!(text.contains("Checks:"));
        assert!(text.contains("[OK] Python"));
        assert!(text.contains("[!!] PyInstaller (optional)"));
        assert!(text.contains("1 optional check(s) failed"));
        assert!(!text.contains("Version:"));

        let text = format_report(&report, true);
        assert!(text.contains("Version: Python 3.12.4"));
    }
}
