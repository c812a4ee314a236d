//! Engine behaviour against a scripted in-memory backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use artmeta_core::{DocumentHandle, Fingerprint, Metadata};
use artmeta_storage::{ensure_unchanged, fingerprint, DocumentStream, StorageClient, StorageError};
use artmeta_sync::{FailureStage, ItemOutcome, SyncEngine, SyncError, SyncOptions};

const WITH_HEADER: &str = "---\ntitle: T\ntags: [a, b]\ngeolocation: \"10.0 20.0\"\n---\nbody\n";

// ---------------------------------------------------------------------------
// Mock backend
// ---------------------------------------------------------------------------

/// Hands out at most three bytes per poll and counts itself as open until
/// dropped.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    open: Arc<AtomicUsize>,
}

impl AsyncRead for Trickle {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let n = (this.data.len() - this.pos).min(3).min(buf.remaining());
        buf.put_slice(&this.data[this.pos..this.pos + n]);
        this.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl Drop for Trickle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct MockStorage {
    docs: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Replacement content stored right after a document is read.
    edit_after_read: HashMap<String, String>,
    recorded: Mutex<HashMap<String, (Fingerprint, Metadata)>>,
    fail_list: bool,
    fail_changed: HashSet<String>,
    fail_read: HashSet<String>,
    panic_read: HashSet<String>,
    fail_write: HashSet<String>,
    delay: Option<Duration>,
    writes: AtomicUsize,
    open_streams: Arc<AtomicUsize>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl MockStorage {
    fn with_docs(docs: &[(&str, &str)]) -> Self {
        Self {
            docs: Mutex::new(
                docs.iter()
                    .map(|(name, content)| (name.to_string(), content.as_bytes().to_vec()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn content(&self, document: &DocumentHandle) -> Result<Vec<u8>, StorageError> {
        self.docs
            .lock()
            .unwrap()
            .get(document.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                document: document.clone(),
            })
    }

    fn recorded(&self, document: &str) -> Option<(Fingerprint, Metadata)> {
        self.recorded.lock().unwrap().get(document).cloned()
    }

    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl StorageClient for MockStorage {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list(&self) -> artmeta_storage::Result<Vec<DocumentHandle>> {
        if self.fail_list {
            return Err(StorageError::InvalidResponse("listing unavailable".into()));
        }
        let docs = self.docs.lock().unwrap();
        Ok(docs.keys().map(|k| DocumentHandle::from(k.as_str())).collect())
    }

    async fn changed(&self, document: &DocumentHandle) -> artmeta_storage::Result<bool> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.pause().await;

        if self.fail_changed.contains(document.as_str()) {
            return Err(StorageError::InvalidResponse("object info unavailable".into()));
        }
        let current = fingerprint(&self.content(document)?);
        let recorded = self.recorded(document.as_str()).map(|(fp, _)| fp);
        Ok(recorded != Some(current))
    }

    async fn read(&self, document: &DocumentHandle) -> artmeta_storage::Result<DocumentStream> {
        self.pause().await;
        if self.panic_read.contains(document.as_str()) {
            panic!("reader exploded for {document}");
        }
        if self.fail_read.contains(document.as_str()) {
            return Err(StorageError::InvalidResponse("connection reset".into()));
        }
        let data = self.content(document)?;
        if let Some(edited) = self.edit_after_read.get(document.as_str()) {
            self.docs
                .lock()
                .unwrap()
                .insert(document.to_string(), edited.as_bytes().to_vec());
        }
        self.open_streams.fetch_add(1, Ordering::SeqCst);
        Ok(DocumentStream {
            declared_len: data.len() as u64,
            reader: Box::new(Trickle {
                data,
                pos: 0,
                open: Arc::clone(&self.open_streams),
            }),
        })
    }

    async fn write_metadata(
        &self,
        document: &DocumentHandle,
        metadata: &Metadata,
        expected: &Fingerprint,
    ) -> artmeta_storage::Result<Fingerprint> {
        self.pause().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        metadata.validate()?;
        if self.fail_write.contains(document.as_str()) {
            return Err(StorageError::InvalidResponse("upload rejected".into()));
        }
        let recorded = ensure_unchanged(document, &self.content(document)?, expected)?;
        self.recorded
            .lock()
            .unwrap()
            .insert(document.to_string(), (recorded.clone(), metadata.clone()));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(recorded)
    }
}

fn engine(storage: &Arc<MockStorage>, max_concurrent_jobs: usize, dry_run: bool) -> SyncEngine {
    let client: Arc<dyn StorageClient> = storage.clone();
    SyncEngine::new(
        client,
        SyncOptions {
            max_concurrent_jobs,
            dry_run,
        },
    )
}

fn stage(outcome: Option<&ItemOutcome>) -> Option<FailureStage> {
    match outcome {
        Some(ItemOutcome::Failed { stage, .. }) => Some(*stage),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn second_run_performs_no_writes() {
    let storage = Arc::new(MockStorage::with_docs(&[
        ("a.md", WITH_HEADER),
        ("b.md", "---\ntitle: B\n---\n"),
    ]));

    let first = engine(&storage, 4, false).run().await.expect("first run");
    assert_eq!(first.written, 2);

    let second = engine(&storage, 4, false).run().await.expect("second run");
    assert_eq!(second.written, 0);
    assert_eq!(second.unchanged, 2);
    assert_eq!(storage.writes(), 2);
}

#[tokio::test]
async fn written_metadata_matches_header() {
    let storage = Arc::new(MockStorage::with_docs(&[("a.md", WITH_HEADER)]));

    let report = engine(&storage, 1, false).run().await.expect("run");

    let (recorded, metadata) = storage.recorded("a.md").expect("written");
    assert_eq!(recorded, fingerprint(WITH_HEADER.as_bytes()));
    assert_eq!(
        report.outcome("a.md"),
        Some(&ItemOutcome::Written {
            fingerprint: recorded
        })
    );
    assert_eq!(metadata.title.as_deref(), Some("T"));
    assert_eq!(metadata.tags, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(metadata.geolocation.as_deref(), Some("10.0 20.0"));
}

#[tokio::test]
async fn failures_stay_with_their_document() {
    let mut mock = MockStorage::with_docs(&[
        ("a.md", WITH_HEADER),
        ("b.md", WITH_HEADER),
        ("c.md", "---\ntitle: [not, a, string]\n---\n"),
        ("d.md", WITH_HEADER),
        ("e.md", "---\ngeolocation: \"abc 2.0\"\n---\n"),
        ("f.md", WITH_HEADER),
        ("g.md", WITH_HEADER),
    ]);
    mock.fail_read = MockStorage::set(&["b.md"]);
    mock.fail_write = MockStorage::set(&["d.md"]);
    mock.panic_read = MockStorage::set(&["f.md"]);
    let storage = Arc::new(mock);

    let report = engine(&storage, 3, false).run().await.expect("run completes");

    assert_eq!(report.total(), 7);
    assert_eq!(report.written, 2);
    assert_eq!(report.failed, 5);
    assert!(matches!(report.outcome("a.md"), Some(ItemOutcome::Written { .. })));
    assert!(matches!(report.outcome("g.md"), Some(ItemOutcome::Written { .. })));
    assert_eq!(stage(report.outcome("b.md")), Some(FailureStage::Read));
    assert_eq!(stage(report.outcome("c.md")), Some(FailureStage::Decode));
    assert_eq!(stage(report.outcome("d.md")), Some(FailureStage::Write));
    assert_eq!(stage(report.outcome("e.md")), Some(FailureStage::Validate));
    assert_eq!(stage(report.outcome("f.md")), Some(FailureStage::Worker));
    assert!(storage.recorded("d.md").is_none());
    assert!(storage.recorded("e.md").is_none());
}

#[tokio::test]
async fn documents_without_header_are_skipped_silently() {
    let storage = Arc::new(MockStorage::with_docs(&[
        ("plain.md", "just a body\n"),
        ("unterminated.md", "---\ntitle: T\nno closing line\n"),
    ]));

    let report = engine(&storage, 2, false).run().await.expect("run");

    assert_eq!(report.no_header, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(storage.writes(), 0);
}

#[tokio::test]
async fn change_check_error_is_treated_as_changed() {
    let mut mock = MockStorage::with_docs(&[("a.md", WITH_HEADER)]);
    mock.fail_changed = MockStorage::set(&["a.md"]);
    let storage = Arc::new(mock);

    let report = engine(&storage, 1, false).run().await.expect("run");

    assert!(matches!(report.outcome("a.md"), Some(ItemOutcome::Written { .. })));
    assert_eq!(storage.writes(), 1);
}

#[tokio::test]
async fn edit_between_read_and_write_is_picked_up_next_run() {
    let mut mock = MockStorage::with_docs(&[("a.md", "---\ntitle: Old\n---\n")]);
    mock.edit_after_read
        .insert("a.md".to_string(), "---\ntitle: New\n---\n".to_string());
    let storage = Arc::new(mock);

    let first = engine(&storage, 1, false).run().await.expect("first run");
    assert_eq!(stage(first.outcome("a.md")), Some(FailureStage::Write));
    assert!(storage.recorded("a.md").is_none());

    let second = engine(&storage, 1, false).run().await.expect("second run");
    assert!(matches!(second.outcome("a.md"), Some(ItemOutcome::Written { .. })));
    let (_, metadata) = storage.recorded("a.md").expect("written");
    assert_eq!(metadata.title.as_deref(), Some("New"));
}

#[tokio::test]
async fn listing_failure_aborts_run() {
    let mut mock = MockStorage::with_docs(&[("a.md", WITH_HEADER)]);
    mock.fail_list = true;
    let storage = Arc::new(mock);

    let err = engine(&storage, 1, false).run().await.expect_err("fatal");
    assert!(matches!(err, SyncError::List { backend: "mock", .. }));
    assert_eq!(storage.writes(), 0);
}

#[tokio::test]
async fn short_reads_are_read_to_completion() {
    let body = "x".repeat(50_000);
    let content = format!("---\ntitle: Long\n---\n{body}");
    let storage = Arc::new(MockStorage::with_docs(&[("long.md", content.as_str())]));

    let report = engine(&storage, 1, false).run().await.expect("run");

    assert_eq!(report.written, 1);
    let (_, metadata) = storage.recorded("long.md").expect("written");
    assert_eq!(metadata.title.as_deref(), Some("Long"));
}

#[tokio::test]
async fn streams_are_released_on_every_path() {
    let mut mock = MockStorage::with_docs(&[
        ("ok.md", WITH_HEADER),
        ("plain.md", "no header"),
        ("broken.md", "---\ntitle: [x]\n---\n"),
        ("rejected.md", WITH_HEADER),
        ("badgeo.md", "---\ngeolocation: \"1.0\"\n---\n"),
    ]);
    mock.fail_write = MockStorage::set(&["rejected.md"]);
    let storage = Arc::new(mock);

    engine(&storage, 2, false).run().await.expect("run");

    assert_eq!(storage.open_streams.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_documents_never_exceed_bound() {
    for bound in [1, 2] {
        let names: Vec<String> = (0..10).map(|i| format!("{i:02}.md")).collect();
        let docs: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), WITH_HEADER)).collect();
        let mut mock = MockStorage::with_docs(&docs);
        mock.delay = Some(Duration::from_millis(20));
        let storage = Arc::new(mock);

        let report = engine(&storage, bound, false).run().await.expect("run");

        assert_eq!(report.written, 10);
        assert_eq!(storage.peak.load(Ordering::SeqCst), bound, "bound {bound}");
    }
}

#[tokio::test]
async fn report_keeps_listing_order() {
    let storage = Arc::new(MockStorage::with_docs(&[
        ("c.md", WITH_HEADER),
        ("a.md", "plain"),
        ("b.md", WITH_HEADER),
    ]));

    let report = engine(&storage, 3, false).run().await.expect("run");

    let order: Vec<&str> = report.documents.iter().map(|d| d.document.as_str()).collect();
    assert_eq!(order, vec!["a.md", "b.md", "c.md"]);
}

#[tokio::test]
async fn dry_run_validates_but_never_writes() {
    let storage = Arc::new(MockStorage::with_docs(&[
        ("a.md", WITH_HEADER),
        ("bad.md", "---\ngeolocation: \"1.0 2.0 0.5 9.9\"\n---\n"),
    ]));

    let report = engine(&storage, 2, true).run().await.expect("run");

    assert!(report.dry_run);
    assert_eq!(report.outcome("a.md"), Some(&ItemOutcome::WouldWrite));
    assert_eq!(stage(report.outcome("bad.md")), Some(FailureStage::Validate));
    assert_eq!(storage.writes(), 0);
}
