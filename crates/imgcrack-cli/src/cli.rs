use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "imgcrack")]
#[command(bin_name = "imgcrack")]
#[command(version)]
#[command(about = "Interruptible password search against encrypted macOS disk images")]
#[command(
    after_help = "While running: s = skip current source, b = skip current image, q = quit."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(
        long,
        value_name = "DIR",
        global = true,
        help = "Directory holding disk images [default: current directory]"
    )]
    pub dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        global = true,
        help = "Directory holding candidate lists [default: same as --dir]"
    )]
    pub sources: Option<PathBuf>,

    #[arg(
        long,
        value_name = "PATH",
        global = true,
        help = "Config file [default: ~/.config/imgcrack/config.toml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,

    #[arg(long, global = true, help = "Write logs and panics to a diagnostics file")]
    pub diagnostics: bool,

    #[arg(long, conflicts_with = "keep_order", help = "Always prompt for a manual image order")]
    pub reorder: bool,

    #[arg(long, help = "Keep the discovered image order without prompting")]
    pub keep_order: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Run environment and configuration checks")]
    Doctor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingMode {
    Ask,
    Manual,
    Keep,
}

impl Cli {
    pub fn ordering_mode(&self) -> OrderingMode {
        match (self.reorder, self.keep_order) {
            (true, _) => OrderingMode::Manual,
            (false, true) => OrderingMode::Keep,
            (false, false) => OrderingMode::Ask,
        }
    }
}
