use std::io::{self, IsTerminal, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use comfy_table::{Cell, ContentArrangement, Table};
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use imgcrack_core::candidates::CandidateSource;
use imgcrack_core::events::{Reporter, RunEvent, SourceRow};
use imgcrack_core::scheduler::{TargetOutcome, TargetReport};
use imgcrack_core::time::{format_eta, format_hms};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(125);

#[derive(Debug, Default)]
struct ProgressLine {
    last_draw: Option<Instant>,
    open: bool,
}

/// Renders run events on stdout. Progress redraws a single line in place
/// on a terminal and is throttled to about eight updates per second.
#[derive(Debug)]
pub struct ConsoleReporter {
    progress: Mutex<ProgressLine>,
    interactive: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            progress: Mutex::new(ProgressLine::default()),
            interactive: io::stdout().is_terminal(),
        }
    }

    fn draw_progress(&self, line: String, finished: bool) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let due = progress
            .last_draw
            .is_none_or(|last| now.duration_since(last) >= PROGRESS_INTERVAL);
        if !due && !finished {
            return;
        }
        progress.last_draw = Some(now);

        let mut stdout = io::stdout().lock();
        if self.interactive {
            progress.open = true;
            let _ = queue!(
                stdout,
                MoveToColumn(0),
                Clear(ClearType::CurrentLine),
                Print(line)
            );
        } else {
            let _ = writeln!(stdout, "{line}");
        }
        let _ = stdout.flush();
    }

    fn end_progress(&self) {
        let mut progress = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
        if progress.open {
            println!();
            progress.open = false;
        }
        progress.last_draw = None;
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for ConsoleReporter {
    fn report(&self, event: &RunEvent) {
        if let RunEvent::Progress {
            checked,
            total,
            rate,
            eta_secs,
        } = event
        {
            self.draw_progress(
                progress_line(*checked, *total, *rate, *eta_secs),
                checked >= total,
            );
            return;
        }

        self.end_progress();
        match event {
            RunEvent::TargetStarted { target } => {
                println!();
                println!("{}", format!("=== {} ===", file_label(target)).cyan().bold());
            }
            RunEvent::SourceStarted { source, total } => {
                println!(
                    "{} Trying {} ({total} candidates)",
                    "[*]".yellow(),
                    file_label(source)
                );
            }
            RunEvent::DecisionPrompt {
                current,
                sources,
                eta_secs,
                window,
            } => {
                println!("{}", decision_table(*current, sources));
                let choices = format!(
                    "Enter continues, s skips it, 1-{} jumps to another.",
                    sources.len()
                );
                println!(
                    "{} ETA {} for this source. {choices}",
                    "[?]".magenta().bold(),
                    format_eta(*eta_secs),
                );
                println!("Continuing automatically in {}s.", window.as_secs());
            }
            RunEvent::DecisionReminder { remaining } => {
                let reminder = format!("{}s left to choose", remaining.as_secs());
                println!("{}", reminder.dark_grey());
            }
            RunEvent::InvalidDecisionInput { input, max_index } => {
                let message = format!(
                    "Invalid choice '{input}'. Enter a number 1-{max_index}, s, or nothing."
                );
                println!("{}", message.red());
            }
            RunEvent::DecisionTimedOut => println!("No choice made, continuing."),
            RunEvent::SourceSkipped { source } => {
                println!("{} Skipped {}", "[>]".yellow(), file_label(source));
            }
            RunEvent::SourceUnreadable { source, reason } => {
                println!(
                    "{} Cannot read {}: {reason}",
                    "[!]".red(),
                    file_label(source)
                );
            }
            RunEvent::TargetSkipped { target } => {
                println!("{} Skipped image {}", "[>]".yellow(), file_label(target));
            }
            RunEvent::Found {
                target,
                candidate,
                elapsed,
            } => {
                println!(
                    "{}",
                    format!(
                        "[+] Password for {}: {} (after {})",
                        file_label(target),
                        render_secret(candidate),
                        format_hms(*elapsed)
                    )
                    .green()
                    .bold()
                );
            }
            RunEvent::NoMatch { target } => {
                println!("{} No password found for {}", "[-]".red(), file_label(target));
            }
            RunEvent::Aborted => println!("{}", "[x] Aborted by operator".red().bold()),
            RunEvent::Progress { .. } => {}
        }
    }
}

pub fn progress_line(checked: u64, total: u64, rate: f64, eta_secs: f64) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        (checked as f64 / total as f64 * 100.0).min(100.0)
    };
    format!(
        "{checked}/{total} ({percent:.1}%)  {rate:.1}/s  ETA {}",
        format_eta(eta_secs)
    )
}

fn decision_table(current: usize, sources: &[SourceRow]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Source", "Size", ""]);
    for (index, source) in sources.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(source.name.as_str()),
            Cell::new(human_size(source.size_bytes)),
            Cell::new(if index == current { "<- next" } else { "" }),
        ]);
    }
    table
}

pub fn sources_table(sources: &[CandidateSource]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Source", "Size"]);
    for (index, source) in sources.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(source.display_name()),
            Cell::new(human_size(source.size_bytes)),
        ]);
    }
    table
}

pub fn summary_table(reports: &[TargetReport]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Disk image", "Outcome", "Detail"]);
    for report in reports {
        let (outcome, detail) = outcome_cells(&report.outcome);
        table.add_row(vec![
            Cell::new(file_label(&report.target)),
            Cell::new(outcome),
            Cell::new(detail),
        ]);
    }
    table
}

fn outcome_cells(outcome: &TargetOutcome) -> (&'static str, String) {
    match outcome {
        TargetOutcome::Found {
            candidate,
            elapsed,
            source,
        } => (
            "FOUND",
            format!(
                "{} in {} from {}",
                render_secret(candidate),
                format_hms(*elapsed),
                file_label(source)
            ),
        ),
        TargetOutcome::NoMatch => ("NO MATCH", "all sources exhausted".to_string()),
        TargetOutcome::SkippedTarget => ("SKIPPED", "skipped by operator".to_string()),
        TargetOutcome::Aborted => ("ABORTED", "run aborted".to_string()),
    }
}

/// The text when it is valid UTF-8, always followed by the escaped bytes.
pub fn render_secret(secret: &[u8]) -> String {
    let escaped = secret.escape_ascii();
    match std::str::from_utf8(secret) {
        Ok(text) => format!("'{text}' (b\"{escaped}\")"),
        Err(_) => format!("<not UTF-8> (b\"{escaped}\")"),
    }
}

pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
