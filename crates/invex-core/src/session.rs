//! Per-user session state and the batch parse flow.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::UploadError;
use crate::extract::InvoiceExtractor;
use crate::models::config::ExtractionConfig;
use crate::models::invoice::ParsedInvoice;
use crate::schema::SchemaDescriptor;
use crate::tables::{DerivedTables, reshape};
use crate::upload::{InvoiceImage, Upload};

/// Outcome of one file in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The file produced a validated invoice.
    Parsed {
        filename: String,
        invoice_number: String,
        items: usize,
    },
    /// Upload check or extraction failed.
    Failed { filename: String, message: String },
}

impl FileOutcome {
    pub fn filename(&self) -> &str {
        match self {
            FileOutcome::Parsed { filename, .. } | FileOutcome::Failed { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Parsed { .. })
    }
}

/// Severity of a user-visible message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Error,
    Success,
}

/// A message shown to the user after a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

/// Summary of one parse action.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Per-file outcomes in upload order.
    pub outcomes: Vec<FileOutcome>,
    /// When the batch finished.
    pub finished_at: DateTime<Utc>,
    /// Wall time of the whole batch.
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Failed outcomes, in upload order.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// User-visible messages: per-file errors first, then the success count.
    pub fn messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Failed { message, .. } => Some(Message {
                    level: MessageLevel::Error,
                    text: message.clone(),
                }),
                FileOutcome::Parsed { .. } => None,
            })
            .collect();

        let count = self.success_count();
        if count > 0 {
            messages.push(Message {
                level: MessageLevel::Success,
                text: format!("Successfully processed {count} invoices!"),
            });
        }

        messages
    }
}

/// Hooks called while a batch is processed.
pub trait BatchObserver {
    /// Called before a file is checked and sent for extraction.
    fn on_file_start(&mut self, _index: usize, _total: usize, _filename: &str) {}

    /// Called after a file finished, successfully or not.
    fn on_file_done(&mut self, _outcome: &FileOutcome) {}
}

/// Observer that ignores all events.
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

/// One user's interactive state: the current batch and its derived tables.
///
/// Every parse action replaces the held state wholesale.
#[derive(Debug, Clone)]
pub struct Session {
    batch: Vec<ParsedInvoice>,
    tables: DerivedTables,
    show_results: bool,
    last_report: Option<BatchReport>,
    max_image_bytes: usize,
}

impl Session {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            batch: Vec::new(),
            tables: DerivedTables::default(),
            show_results: true,
            last_report: None,
            max_image_bytes: ExtractionConfig::default().max_image_bytes,
        }
    }

    /// Set the largest accepted image size.
    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    /// Drop the held batch, tables and last report.
    pub fn reset(&mut self) {
        self.batch.clear();
        self.tables = DerivedTables::default();
        self.show_results = true;
        self.last_report = None;
    }

    /// The invoices held from the last successful parse.
    pub fn batch(&self) -> &[ParsedInvoice] {
        &self.batch
    }

    /// Report of the last parse action, if any.
    pub fn last_report(&self) -> Option<&BatchReport> {
        self.last_report.as_ref()
    }

    /// Derived tables, when there are results to display.
    pub fn visible_tables(&self) -> Option<&DerivedTables> {
        (self.show_results && !self.tables.is_empty()).then_some(&self.tables)
    }

    /// Parse a batch of uploads, replacing any previously held results.
    ///
    /// Files are processed in order, one at a time. A failing file is
    /// reported by name and does not stop the remaining files.
    pub async fn parse_batch<O>(
        &mut self,
        extractor: &dyn InvoiceExtractor,
        uploads: &[Upload],
        observer: &mut O,
    ) -> &BatchReport
    where
        O: BatchObserver + Send,
    {
        let inputs = uploads
            .iter()
            .map(|upload| (upload.filename.as_str(), Ok(upload)))
            .collect();
        self.run_batch(extractor, inputs, observer).await
    }

    /// Parse a batch of files read from disk.
    ///
    /// A file that cannot be read counts as a failed file of the batch.
    pub async fn parse_paths<O>(
        &mut self,
        extractor: &dyn InvoiceExtractor,
        paths: &[PathBuf],
        observer: &mut O,
    ) -> &BatchReport
    where
        O: BatchObserver + Send,
    {
        let read: Vec<(String, Result<Upload, UploadError>)> = paths
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| path.display().to_string());
                let upload =
                    Upload::from_path(path).map_err(|e| UploadError::Unreadable(e.to_string()));
                (name, upload)
            })
            .collect();

        let inputs = read
            .iter()
            .map(|(name, upload)| (name.as_str(), upload.as_ref().map_err(Clone::clone)))
            .collect();
        self.run_batch(extractor, inputs, observer).await
    }

    async fn run_batch<O>(
        &mut self,
        extractor: &dyn InvoiceExtractor,
        inputs: Vec<(&str, Result<&Upload, UploadError>)>,
        observer: &mut O,
    ) -> &BatchReport
    where
        O: BatchObserver + Send,
    {
        let start = Instant::now();
        self.reset();

        let schema = SchemaDescriptor::invoice();
        let total = inputs.len();
        let mut parsed = Vec::new();
        let mut outcomes = Vec::with_capacity(total);

        if total > 0 {
            info!("Parsing batch of {} files", total);
        }

        for (index, (filename, upload)) in inputs.into_iter().enumerate() {
            observer.on_file_start(index, total, filename);

            let checked = upload.and_then(|upload| {
                debug!(filename, bytes = upload.data.len(), "Processing file");
                InvoiceImage::from_upload(upload, self.max_image_bytes)
            });
            let result = match checked {
                Ok(image) => extractor
                    .extract(&image, &schema)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            let outcome = match result {
                Ok(invoice) => {
                    let outcome = FileOutcome::Parsed {
                        filename: filename.to_string(),
                        invoice_number: invoice.invoice_number.clone(),
                        items: invoice.items.len(),
                    };
                    parsed.push(ParsedInvoice::new(invoice, filename));
                    outcome
                }
                Err(error) => {
                    warn!("Failed to process {}: {}", filename, error);
                    FileOutcome::Failed {
                        filename: filename.to_string(),
                        message: format!("Error processing {}: {}", filename, error),
                    }
                }
            };

            observer.on_file_done(&outcome);
            outcomes.push(outcome);
        }

        if parsed.is_empty() {
            self.show_results = false;
        } else {
            self.tables = reshape(&parsed);
            self.batch = parsed;
            self.show_results = true;
        }

        let report = BatchReport {
            outcomes,
            finished_at: Utc::now(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        };

        if total > 0 {
            info!(
                "Batch complete: {} parsed, {} failed in {}ms",
                report.success_count(),
                report.failure_count(),
                report.elapsed_ms
            );
        }

        self.last_report.insert(report)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::extract;
    use crate::models::invoice::Invoice;
    use crate::tables::tests::invoice;
    use crate::upload::tests::{JPEG_MAGIC, PNG_MAGIC};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Extractor returning queued results in call order.
    struct MockExtractor {
        results: Mutex<VecDeque<extract::Result<Invoice>>>,
        calls: AtomicUsize,
    }

    impl MockExtractor {
        fn new(results: Vec<extract::Result<Invoice>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InvoiceExtractor for MockExtractor {
        async fn extract(
            &self,
            _image: &InvoiceImage,
            _schema: &SchemaDescriptor,
        ) -> extract::Result<Invoice> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected extraction call")
        }
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<String>,
        done: Vec<bool>,
    }

    impl BatchObserver for Recorder {
        fn on_file_start(&mut self, _index: usize, _total: usize, filename: &str) {
            self.started.push(filename.to_string());
        }

        fn on_file_done(&mut self, outcome: &FileOutcome) {
            self.done.push(outcome.is_success());
        }
    }

    fn png(name: &str) -> Upload {
        Upload::new(name, PNG_MAGIC.to_vec())
    }

    fn transport_error() -> ExtractionError {
        ExtractionError::Transport("connection reset".into())
    }

    #[tokio::test]
    async fn test_one_success_one_transport_failure() {
        let extractor = MockExtractor::new(vec![Ok(invoice("INV-A", 3)), Err(transport_error())]);
        let mut session = Session::new();
        let uploads = vec![png("a.png"), png("b.png")];

        let report = session
            .parse_batch(&extractor, &uploads, &mut NoopObserver)
            .await
            .clone();

        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(
            report.messages(),
            vec![
                Message {
                    level: MessageLevel::Error,
                    text: "Error processing b.png: request failed: connection reset".into(),
                },
                Message {
                    level: MessageLevel::Success,
                    text: "Successfully processed 1 invoices!".into(),
                },
            ]
        );

        let tables = session.visible_tables().unwrap();
        assert_eq!(tables.counts(), (1, 3, 1));
        assert!(tables.items.iter().all(|r| r.invoice_number == "INV-A"));
        assert!(tables.items.iter().all(|r| r.filename == "a.png"));
        assert_eq!(session.batch().len(), 1);
    }

    #[tokio::test]
    async fn test_k_of_n_successes() {
        let extractor = MockExtractor::new(vec![
            Err(ExtractionError::Validation("missing field `tax`".into())),
            Ok(invoice("INV-2", 1)),
            Err(transport_error()),
            Ok(invoice("INV-4", 2)),
        ]);
        let mut session = Session::new();
        let uploads = vec![png("1.png"), png("2.png"), png("3.png"), png("4.png")];

        let report = session
            .parse_batch(&extractor, &uploads, &mut NoopObserver)
            .await;
        let failed: Vec<&str> = report.failures().map(|o| o.filename()).collect();
        assert_eq!(failed, vec!["1.png", "3.png"]);

        let tables = session.visible_tables().unwrap();
        assert_eq!(tables.counts(), (2, 3, 2));
        assert_eq!(extractor.calls(), 4);
    }

    #[tokio::test]
    async fn test_all_failures_hide_results() {
        let extractor = MockExtractor::new(vec![Err(transport_error())]);
        let mut session = Session::new();

        let report = session
            .parse_batch(&extractor, &[png("a.png")], &mut NoopObserver)
            .await;
        assert_eq!(report.messages().len(), 1);
        assert_eq!(report.messages()[0].level, MessageLevel::Error);

        assert!(session.visible_tables().is_none());
        assert!(session.batch().is_empty());
    }

    #[tokio::test]
    async fn test_zero_uploads_makes_no_calls() {
        let extractor = MockExtractor::new(vec![Ok(invoice("INV-1", 1))]);
        let mut session = Session::new();
        session
            .parse_batch(&extractor, &[png("a.png")], &mut NoopObserver)
            .await;
        assert!(session.visible_tables().is_some());

        let report = session
            .parse_batch(&extractor, &[], &mut NoopObserver)
            .await;
        assert!(report.outcomes.is_empty());
        assert!(report.messages().is_empty());
        assert_eq!(extractor.calls(), 1);
        assert!(session.visible_tables().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_path_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.png");
        std::fs::write(&ok, PNG_MAGIC).unwrap();
        let paths = vec![dir.path().join("missing.png"), ok];

        let extractor = MockExtractor::new(vec![Ok(invoice("INV-1", 2))]);
        let mut session = Session::new();
        let mut recorder = Recorder::default();

        let report = session
            .parse_paths(&extractor, &paths, &mut recorder)
            .await
            .clone();

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.outcomes[0].filename(), "missing.png");
        assert!(
            report.messages()[0]
                .text
                .starts_with("Error processing missing.png: could not read file: ")
        );
        assert_eq!(recorder.started, vec!["missing.png", "ok.png"]);
        assert_eq!(extractor.calls(), 1);

        let tables = session.visible_tables().unwrap();
        assert_eq!(tables.invoices[0].filename, "ok.png");
        assert_eq!(tables.items.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_upload_skips_extractor() {
        let extractor = MockExtractor::new(vec![Ok(invoice("INV-1", 1))]);
        let mut session = Session::new();
        let uploads = vec![
            Upload::new("notes.txt", b"hello".to_vec()),
            Upload::new("fake.jpg", b"plain text".to_vec()),
            Upload::new("real.jpg", JPEG_MAGIC.to_vec()),
        ];

        let report = session
            .parse_batch(&extractor, &uploads, &mut NoopObserver)
            .await;
        assert_eq!(report.failure_count(), 2);
        assert!(report.messages()[0].text.starts_with("Error processing notes.txt: "));
        assert_eq!(extractor.calls(), 1);
    }

    #[tokio::test]
    async fn test_reparse_replaces_tables() {
        let extractor = MockExtractor::new(vec![
            Ok(invoice("OLD-1", 2)),
            Ok(invoice("OLD-2", 2)),
            Ok(invoice("NEW-1", 1)),
        ]);
        let mut session = Session::new();

        session
            .parse_batch(&extractor, &[png("a.png"), png("b.png")], &mut NoopObserver)
            .await;
        assert_eq!(session.visible_tables().unwrap().counts(), (2, 4, 2));

        session
            .parse_batch(&extractor, &[png("c.png")], &mut NoopObserver)
            .await;
        let tables = session.visible_tables().unwrap();
        assert_eq!(tables.counts(), (1, 1, 1));
        assert_eq!(tables.invoices[0].invoice_number, "NEW-1");
    }

    #[tokio::test]
    async fn test_observer_sees_every_file() {
        let extractor = MockExtractor::new(vec![Ok(invoice("INV-1", 0)), Err(transport_error())]);
        let mut session = Session::new();
        let mut recorder = Recorder::default();

        session
            .parse_batch(&extractor, &[png("a.png"), png("b.png")], &mut recorder)
            .await;
        assert_eq!(recorder.started, vec!["a.png", "b.png"]);
        assert_eq!(recorder.done, vec![true, false]);
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let extractor = MockExtractor::new(vec![Ok(invoice("INV-1", 1))]);
        let mut session = Session::new();
        session
            .parse_batch(&extractor, &[png("a.png")], &mut NoopObserver)
            .await;

        session.reset();
        assert!(session.visible_tables().is_none());
        assert!(session.last_report().is_none());
        assert!(session.batch().is_empty());
    }
}
