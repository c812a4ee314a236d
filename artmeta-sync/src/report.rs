//! Per-document outcomes and the run report.

use std::fmt;

use serde::Serialize;

use artmeta_core::{DocumentHandle, Fingerprint};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Step at which a document was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Read,
    Decode,
    Validate,
    Write,
    /// The worker task panicked or was cancelled.
    Worker,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureStage::Read => "read",
            FailureStage::Decode => "decode",
            FailureStage::Validate => "validate",
            FailureStage::Write => "write",
            FailureStage::Worker => "worker",
        };
        f.write_str(s)
    }
}

/// Terminal state of one document within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Recorded fingerprint matches the current content.
    Unchanged,
    /// No header block; the document is not managed.
    NoHeader,
    /// Attributes were replaced; `fingerprint` is the one recorded.
    Written { fingerprint: Fingerprint },
    /// Dry run: the document would have been written.
    WouldWrite,
    Failed { stage: FailureStage, error: String },
}

impl ItemOutcome {
    pub(crate) fn failed(stage: FailureStage, error: impl fmt::Display) -> Self {
        ItemOutcome::Failed {
            stage,
            error: error.to_string(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentReport {
    pub document: DocumentHandle,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

/// Result of a completed run, documents in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub written: usize,
    pub would_write: usize,
    pub unchanged: usize,
    pub no_header: usize,
    pub failed: usize,
    pub documents: Vec<DocumentReport>,
}

impl SyncReport {
    pub(crate) fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, document: DocumentHandle, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Unchanged => self.unchanged += 1,
            ItemOutcome::NoHeader => self.no_header += 1,
            ItemOutcome::Written { .. } => self.written += 1,
            ItemOutcome::WouldWrite => self.would_write += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
        self.documents.push(DocumentReport { document, outcome });
    }

    pub fn total(&self) -> usize {
        self.documents.len()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(|d| d.outcome.is_failure())
    }

    /// Outcome recorded for `document`, if it was listed.
    pub fn outcome(&self, document: &str) -> Option<&ItemOutcome> {
        self.documents
            .iter()
            .find(|d| d.document.as_str() == document)
            .map(|d| &d.outcome)
    }
}
