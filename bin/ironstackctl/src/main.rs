//! ---
//! ironstack_section: "08-cli"
//! ironstack_subsection: "binary"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Control CLI driving persona lifecycle actions."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};

mod lifecycle;

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["/etc/ironstack/ironstack.toml", "ironstack.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Install, start and stop ironstack personas",
    long_about = None
)]
struct Cli {
    /// Configuration file (the IRONSTACK_CONFIG environment variable takes precedence).
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log intended side effects without performing them.
    #[arg(short = 'n', long = "dry-run", action = ArgAction::SetTrue, global = true)]
    dry_run: bool,

    /// Summary output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: lifecycle::LifecycleCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let candidates: Vec<PathBuf> = match &cli.config {
        Some(path) => vec![path.clone()],
        None => DEFAULT_CONFIG_CANDIDATES.iter().map(PathBuf::from).collect(),
    };
    let report = lifecycle::run(cli.command, &candidates, cli.dry_run)?;
    match cli.output {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
