//! `artmeta inspect` — preview the attributes for a local file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use artmeta_core::{frontmatter, LogLevel};
use artmeta_storage::{fingerprint, MetadataAttributes};

use crate::logging;

/// Arguments for `artmeta inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Markdown file to read.
    pub file: PathBuf,
}

impl InspectArgs {
    pub fn run(self, log_json: bool) -> Result<()> {
        logging::init(LogLevel::default(), log_json);

        let content = std::fs::read(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let extracted = frontmatter::extract(&content)
            .with_context(|| format!("failed to decode header of {}", self.file.display()))?;

        let Some(metadata) = extracted.metadata else {
            println!("{}: no header", self.file.display());
            return Ok(());
        };

        let attrs = MetadataAttributes::build(&metadata, &fingerprint(&content))
            .with_context(|| format!("invalid metadata in {}", self.file.display()))?;
        println!("{}", serde_json::to_string_pretty(&attrs)?);
        Ok(())
    }
}
