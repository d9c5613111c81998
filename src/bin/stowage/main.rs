//! Stowage CLI - package Python applications through Nuitka or PyInstaller

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, MessageFormat};
use stowage::util::shell::Shell;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();
    let json = cli.message_format == MessageFormat::Json;

    // Set up logging; stdout is reserved for command output
    let filter = if cli.verbose {
        EnvFilter::new("stowage=debug")
    } else if cli.quiet || json {
        EnvFilter::new("stowage=error")
    } else {
        EnvFilter::new("stowage=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let shell = Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.color, json));

    // Execute command
    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &shell),
        Commands::Clean(args) => commands::clean::execute(args, &shell),
        Commands::Doctor(args) => commands::doctor::execute(args, cli.verbose),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
