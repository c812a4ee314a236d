//! artmeta — sync document header metadata into storage attributes.
//!
//! # Usage
//!
//! ```text
//! artmeta sync [-c config.json] [--dry-run] [--json] [--fail-on-error] [-j <jobs>]
//! artmeta inspect <file>
//! ```
//!
//! Logs go to stderr. `RUST_LOG` overrides the config file's `LogLevel`.

mod commands;
mod logging;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{inspect::InspectArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "artmeta",
    version,
    about = "Keep storage attributes in step with document headers",
    long_about = None,
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write header metadata onto every changed document in the store.
    Sync(SyncArgs),

    /// Show the attributes a sync would write for a local file.
    Inspect(InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Sync(args) => args.run(cli.log_json),
        Commands::Inspect(args) => args.run(cli.log_json),
    }
}
