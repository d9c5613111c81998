//! User-friendly diagnostic messages.
//!
//! Every failed build is rendered as a root cause, optional context lines and
//! numbered suggested fixes.

use std::fmt;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Project dependencies may be missing from the build interpreter.
    pub const INSTALL_REQUIREMENTS: &str =
        "Make sure all dependencies are installed: pip install -r requirements.txt";

    /// Nuitka is missing or outdated.
    pub const INSTALL_NUITKA: &str = "Make sure Nuitka is installed: pip install nuitka --upgrade";

    /// PyInstaller is missing or outdated.
    pub const INSTALL_PYINSTALLER: &str =
        "Make sure PyInstaller is installed: pip install pyinstaller --upgrade";

    /// Nuitka needs a C compiler.
    pub const INSTALL_C_COMPILER: &str =
        "Install a C compiler such as gcc, clang or the MSVC Build Tools";

    /// Interpreter not found.
    pub const CHECK_PYTHON: &str = "Check the interpreter with `--python <path>` or `stowage doctor`";

    /// Rebuild with more backend output.
    pub const DEBUG_BUILD: &str = "Rebuild with `--debug` to see the detailed error";

    /// Verbose output of the backend.
    pub const VERBOSE_BUILD: &str = "Run `stowage build --verbose` to stream the backend output";

    /// A shared runtime library was not found by the artifact.
    pub const VC_REDIST: &str =
        "If a DLL is reported missing, install the latest Visual C++ Redistributable";

    /// A dependency imported dynamically was not bundled.
    pub const HIDDEN_IMPORT: &str =
        "If a module is reported missing, add it with `--include <module>`";

    /// A declared resource path is wrong.
    pub const CHECK_RESOURCES: &str = "Check that every `--include-data` source path is correct";

    /// Partial outputs of an interrupted build must be removed.
    pub const CLEAN_REBUILD: &str = "Rebuild with `stowage build --clean`";

    /// Another build holds the output directory.
    pub const TARGET_BUSY: &str =
        "Wait for the other build to finish, or remove a stale lock left by a crashed build";

    /// Check the environment.
    pub const RUN_DOCTOR: &str = "Run `stowage doctor` to check the build environment";
}

/// An error message with optional context and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let error_prefix = if color { "\x1b[1;31merror\x1b[0m" } else { "error" };
        output.push_str(&format!("{}: {}\n", error_prefix, self.message));

        for ctx in &self.context {
            output.push_str(&format!("  → {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            output.push_str(&format!("{}: consider:\n", help_prefix));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::error("backend `nuitka` is not available")
            .with_context("python3 -m nuitka exited with status 1")
            .with_suggestion(suggestions::INSTALL_NUITKA)
            .with_suggestion(suggestions::RUN_DOCTOR);

        let output = diag.format(false);
        assert!(output.contains("error: backend `nuitka` is not available"));
        assert!(output.contains("→ python3 -m nuitka exited"));
        assert!(output.contains("help: consider:"));
        assert!(output.contains("1. Make sure Nuitka is installed"));
        assert!(output.contains("2. Run `stowage doctor`"));
    }

    #[test]
    fn test_error_without_suggestions() {
        let output = Diagnostic::error("icon not found").format(false);
        assert_eq!(output, "error: icon not found\n");
    }

    #[test]
    fn test_colored_prefix() {
        let output = Diagnostic::error("boom").format(true);
        assert!(output.starts_with("\x1b[1;31merror\x1b[0m: boom"));
    }
}
