//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use stowage::builder::shim::BackendId;
use stowage::util::shell::ColorChoice;

/// Stowage - package Python applications through Nuitka or PyInstaller
#[derive(Parser)]
#[command(name = "stowage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto", value_parser = parse_color)]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Package the application
    Build(BuildArgs),

    /// Remove the artifacts of one backend
    Clean(CleanArgs),

    /// Check the interpreter and packaging backends
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options selecting what is packaged and where it goes.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Packaging backend (nuitka, pyinstaller)
    #[arg(short, long, value_parser = parse_backend)]
    pub backend: Option<BackendId>,

    /// Entry script [default: main.py]
    #[arg(long)]
    pub entry: Option<PathBuf>,

    /// Python interpreter used to run the backend
    #[arg(long, env = "STOWAGE_PYTHON")]
    pub python: Option<PathBuf>,

    /// Name of the produced executable
    #[arg(short = 'n', long)]
    pub output_name: Option<String>,

    /// Output directory [default: dist for nuitka, dist_pyins for pyinstaller]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Build a windowed application without a console
    #[arg(long)]
    pub no_console: bool,

    /// Remove previous artifacts before building
    #[arg(long)]
    pub clean: bool,

    /// Produce a single self-contained executable
    #[arg(long)]
    pub onefile: bool,

    /// Module to exclude (repeatable)
    #[arg(long, value_name = "MODULE")]
    pub exclude: Vec<String>,

    /// Module to force-include (repeatable)
    #[arg(long, value_name = "MODULE")]
    pub include: Vec<String>,

    /// Data to embed as `source<sep>dest`; `=` for nuitka, `;` for pyinstaller
    #[arg(long, value_name = "MAPPING")]
    pub include_data: Vec<String>,

    /// Application icon
    #[arg(long)]
    pub icon: Option<PathBuf>,

    /// Build with backend debugging enabled
    #[arg(long)]
    pub debug: bool,

    /// Parallel compile jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Backend compilation cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Run the artifact after building (with --smoke-arg arguments)
    #[arg(long)]
    pub smoke_check: bool,

    /// Argument passed to the artifact by --smoke-check (repeatable)
    #[arg(long, value_name = "ARG", allow_hyphen_values = true, requires = "smoke_check")]
    pub smoke_arg: Vec<String>,

    /// Print the backend command without running it
    #[arg(long)]
    pub plan: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Backend whose checks are required
    #[arg(short, long, value_parser = parse_backend)]
    pub backend: Option<BackendId>,

    /// Python interpreter to check
    #[arg(long, env = "STOWAGE_PYTHON")]
    pub python: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

fn parse_backend(s: &str) -> Result<BackendId, String> {
    s.parse().map_err(|e: stowage::builder::shim::BackendIdParseError| e.to_string())
}

fn parse_color(s: &str) -> Result<ColorChoice, String> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_args() {
        let cli = Cli::try_parse_from([
            "stowage",
            "build",
            "--backend",
            "pyinstaller",
            "--include-data",
            "assets;assets",
            "--exclude",
            "tkinter",
            "--no-console",
        ])
        .unwrap();

        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.target.backend, Some(BackendId::Bundle));
        assert_eq!(args.include_data, vec!["assets;assets"]);
        assert_eq!(args.exclude, vec!["tkinter"]);
        assert!(args.no_console);
    }

    #[test]
    fn test_invalid_backend() {
        assert!(Cli::try_parse_from(["stowage", "build", "--backend", "cx_freeze"]).is_err());
    }
}
