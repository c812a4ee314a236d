//! `artmeta sync` — refresh attributes of every changed document.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::debug;

use artmeta_core::Config;
use artmeta_sync::{ItemOutcome, SyncEngine, SyncOptions, SyncReport};

use crate::logging;

/// Arguments for `artmeta sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Path to the JSON config file.
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Show what would be written without writing any attributes.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero when any document failed.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Override `MaxConcurrentJobs` from the config file.
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,
}

impl SyncArgs {
    pub fn run(self, log_json: bool) -> Result<()> {
        let config = Config::load_at(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;
        logging::init(config.log_level, log_json);
        debug!(
            path = %self.config.display(),
            storage_type = config.storage.type_tag(),
            "loaded config"
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        let report = runtime.block_on(self.execute(&config))?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }

        if self.fail_on_error && report.has_failures() {
            bail!("{} document(s) failed to sync", report.failed);
        }
        Ok(())
    }

    async fn execute(&self, config: &Config) -> Result<SyncReport> {
        let storage = artmeta_storage::connect(&config.storage)
            .await
            .with_context(|| format!("failed to connect to {} storage", config.storage.type_tag()))?;
        let options = SyncOptions {
            max_concurrent_jobs: self
                .jobs
                .map_or(config.max_concurrent_jobs, usize::from),
            dry_run: self.dry_run,
        };
        let report = SyncEngine::new(storage, options)
            .run()
            .await
            .context("sync aborted")?;
        Ok(report)
    }
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let written = if report.dry_run {
        format!("{} would write", report.would_write)
    } else {
        format!("{} written", report.written)
    };
    let mark = if report.has_failures() {
        "✗".red().bold()
    } else {
        "✓".green().bold()
    };

    println!(
        "{prefix}{mark} {} documents scanned ({written}, {} unchanged, {} without header, {} failed)",
        report.total(),
        report.unchanged,
        report.no_header,
        report.failed
    );

    for doc in &report.documents {
        match &doc.outcome {
            ItemOutcome::Written { .. } => println!("  ✎  {}", doc.document),
            ItemOutcome::WouldWrite => println!("  ~  {}", doc.document),
            ItemOutcome::Unchanged => println!("  ·  {}", doc.document),
            ItemOutcome::NoHeader => println!("  -  {} (no header)", doc.document),
            ItemOutcome::Failed { stage, error } => {
                println!("  {}  {} [{stage}] {error}", "✗".red(), doc.document)
            }
        }
    }
}
