pub mod cli;
pub mod console;
pub mod diagnostics;
pub mod dispatch;
pub mod ordering;
pub mod prompt;

use std::fs::File;
use std::io;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use imgcrack_app::App;
use imgcrack_core::command_runner::SystemCommandRunner;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::diagnostics::DiagnosticsSession;
use crate::prompt::InquirePromptDriver;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let diagnostics = DiagnosticsSession::initialize(cli.diagnostics)?;
    setup_tracing(cli.verbose, diagnostics.log_file()?)?;
    if let Some(path) = diagnostics.path() {
        eprintln!("Diagnostics log: {}", path.display());
    }

    let command_runner = SystemCommandRunner::new();
    let app = App::new(&command_runner);
    let mut prompt = InquirePromptDriver::new();
    let cwd = std::env::current_dir().context("failed to determine current directory")?;

    let result = dispatch::run_with_deps(&cli, &app, &cwd, &mut prompt);
    if let Err(error) = &result {
        diagnostics.record(format!("run failed: {error:#}"));
    }
    result
}

/// `RUST_LOG` overrides the `-v` level. Logs go to the diagnostics file
/// when one is open, otherwise to stderr.
fn setup_tracing(verbose: u8, diagnostics_file: Option<File>) -> Result<()> {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let installed = match diagnostics_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(io::stderr)
            .try_init(),
    };
    installed.map_err(|error| anyhow!("failed to install log subscriber: {error}"))
}
