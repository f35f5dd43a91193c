use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, ContentArrangement, Table};
use imgcrack_app::{App, CrackPlan, Discovery, RunSession};
use imgcrack_core::doctor::{CheckState, DoctorReport};
use imgcrack_core::input::ChannelLines;
use imgcrack_core::signal_bus::{Signal, SignalBus};

use crate::cli::{Cli, Command, OrderingMode};
use crate::console::{ConsoleReporter, sources_table, summary_table};
use crate::ordering::{choose_target_order, order_table};
use crate::prompt::PromptDriver;

pub fn run_with_deps(
    cli: &Cli,
    app: &App<'_>,
    cwd: &Path,
    prompt: &mut dyn PromptDriver,
) -> Result<()> {
    let targets_dir = cli.dir.clone().unwrap_or_else(|| cwd.to_path_buf());
    let sources_dir = cli.sources.clone().unwrap_or_else(|| targets_dir.clone());

    match cli.command {
        Some(Command::Doctor) => run_doctor_command(cli, app, &targets_dir, &sources_dir),
        None => run_root_command(cli, app, &targets_dir, &sources_dir, prompt),
    }
}

fn run_root_command(
    cli: &Cli,
    app: &App<'_>,
    targets_dir: &Path,
    sources_dir: &Path,
    prompt: &mut dyn PromptDriver,
) -> Result<()> {
    let (config_path, config) = app.load_config(cli.config.as_deref())?;
    tracing::debug!(path = %config_path.display(), "config resolved");

    let Discovery { targets, sources } = app.discover(&config, targets_dir, sources_dir)?;

    println!("{}", order_table("#", &targets));
    let targets = resolve_order(cli.ordering_mode(), targets, prompt)?;

    println!("Detected {} disk images", targets.len());
    println!("{}", sources_table(&sources));
    println!("Controls: s = skip source, b = skip image, q = quit (then Enter)");

    let bus = Arc::new(SignalBus::new());
    let handler_bus = Arc::clone(&bus);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, cleaning up...");
        handler_bus.set(Signal::Abort);
    })
    .context("failed to install Ctrl+C handler")?;

    let reporter = ConsoleReporter::new();
    let reports = app.crack(
        &CrackPlan {
            config,
            targets,
            sources,
        },
        RunSession {
            bus,
            reporter: &reporter,
            lines: Box::new(ChannelLines::stdin()),
        },
    )?;

    println!();
    println!("{}", summary_table(&reports));
    Ok(())
}

fn resolve_order(
    mode: OrderingMode,
    targets: Vec<PathBuf>,
    prompt: &mut dyn PromptDriver,
) -> Result<Vec<PathBuf>> {
    if targets.len() < 2 {
        return Ok(targets);
    }

    let manual = match mode {
        OrderingMode::Keep => false,
        OrderingMode::Manual => true,
        OrderingMode::Ask if io::stdin().is_terminal() => {
            prompt.confirm("Reorder disk images manually?", false)?
        }
        OrderingMode::Ask => false,
    };

    if manual {
        choose_target_order(&targets, prompt)
    } else {
        Ok(targets)
    }
}

fn run_doctor_command(
    cli: &Cli,
    app: &App<'_>,
    targets_dir: &Path,
    sources_dir: &Path,
) -> Result<()> {
    let report = app.doctor(cli.config.as_deref(), targets_dir, sources_dir)?;
    print_doctor_report(&report);
    Ok(())
}

fn print_doctor_report(report: &DoctorReport) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Check", "Status", "Details"]);

    for check in &report.checks {
        let status = match check.state {
            CheckState::Pass => "PASS",
            CheckState::Fail => "FAIL",
        };

        table.add_row(vec![
            Cell::new(check.name.as_str()),
            Cell::new(status),
            Cell::new(check.details.as_str()),
        ]);
    }

    println!("{table}");
    println!("{}", report.summary());
}
