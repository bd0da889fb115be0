//! AI-assisted completion of missing record fields.
//!
//! The network side is injected through [`MetadataLookup`] and
//! [`DescriptionWriter`]; this module only decides which records to ask
//! about, parses the free-text answers and persists the results.

use crate::error::VaultError;
use crate::extract::extract_labeled_url;
use crate::store::RecordStore;
use crate::types::EquipmentRecord;
use crate::types::RecordPatch;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const IMAGE_LABEL: &str = "IMAGE";
pub const STORE_LABEL: &str = "STORE";

/// Pause between successive lookups in one batch.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1200);

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response contained no text")]
    EmptyResponse,
    #[error("{0}")]
    Other(String),
}

/// Free-text metadata search: takes `"<brand> <model>"` and answers with
/// text expected to contain `IMAGE: <url>` and/or `STORE: <url>` lines.
pub trait MetadataLookup: Send + Sync {
    fn lookup(&self, query: &str) -> impl Future<Output = Result<String, LookupError>> + Send;
}

/// Rewrites a user's notes about a piece of equipment into a polished
/// description.
pub trait DescriptionWriter: Send + Sync {
    fn polish(
        &self,
        name: &str,
        notes: &str,
    ) -> impl Future<Output = Result<String, LookupError>> + Send;
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("an enrichment batch is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error(transparent)]
    Store(#[from] VaultError),
}

/// A record is a candidate when it has somewhere to buy it but no picture.
pub fn needs_enrichment(record: &EquipmentRecord) -> bool {
    let blank = |s: &Option<String>| s.as_deref().is_none_or(|s| s.trim().is_empty());
    blank(&record.image_reference) && !blank(&record.purchase_url)
}

/// Outcome of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records that needed enrichment when the batch started.
    pub candidates: usize,
    pub updated: usize,
    /// Lookups that answered without an image line.
    pub unmatched: usize,
    pub failed: usize,
    /// Candidates deleted or filled in by someone else mid-batch.
    pub skipped: usize,
    pub cancelled: bool,
}

/// Runs enrichment batches one at a time against a store.
///
/// Store reads and writes are synchronous and run on the calling task. That
/// is fine on a multi-threaded runtime; an embedder serving other requests
/// on the same runtime should drive batches from `spawn_blocking` or a
/// dedicated runtime.
pub struct Enricher<L> {
    store: Arc<RecordStore>,
    lookup: L,
    delay: Duration,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<L: MetadataLookup> Enricher<L> {
    pub fn new(store: Arc<RecordStore>, lookup: L) -> Self {
        Self {
            store,
            lookup,
            delay: DEFAULT_DELAY,
            running: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Look up an image for every candidate, one record at a time.
    ///
    /// Each successful update re-reads the full list and writes it back
    /// before the next lookup starts, so stopping early keeps everything
    /// finished so far. Lookup and parse failures are logged and skipped.
    /// Storage failures end the batch. `cancel` is checked between records.
    ///
    /// Only batches on this `Enricher` are serialized. Two processes
    /// enriching the same data directory are not kept apart; both persist
    /// whole lists, so the last write of each record wins.
    pub async fn run_batch(&self, cancel: &CancellationToken) -> Result<BatchReport, EnrichError> {
        let _guard = RunningGuard::acquire(&self.running).ok_or(EnrichError::AlreadyRunning)?;

        let candidates: Vec<String> = self
            .store
            .load()?
            .into_iter()
            .filter(needs_enrichment)
            .map(|r| r.id)
            .collect();
        let mut report = BatchReport {
            candidates: candidates.len(),
            ..BatchReport::default()
        };
        tracing::info!(candidates = report.candidates, "starting enrichment batch");

        let mut calls = 0usize;
        for id in &candidates {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let Some(record) = self.store.get(id)?.filter(needs_enrichment) else {
                tracing::debug!(id = %id, "candidate no longer needs enrichment");
                report.skipped += 1;
                continue;
            };

            if calls > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.delay) => {}
                }
            }
            calls += 1;

            let text = match self.lookup.lookup(&record.display_name()).await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "metadata lookup failed; leaving record as is");
                    report.failed += 1;
                    continue;
                }
            };

            let Some(url) = extract_labeled_url(&text, IMAGE_LABEL) else {
                tracing::debug!(id = %id, "lookup answer had no image line");
                report.unmatched += 1;
                continue;
            };

            match self.store.modify(id, |r| r.image_reference = Some(url)) {
                Ok(_) => report.updated += 1,
                Err(VaultError::NotFound(_)) => report.skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            updated = report.updated,
            unmatched = report.unmatched,
            failed = report.failed,
            cancelled = report.cancelled,
            "enrichment batch finished"
        );
        Ok(report)
    }
}

/// URLs found in one lookup answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub store_url: Option<String>,
    pub image_url: Option<String>,
}

/// Ask for links for a record that is still being filled in.
pub async fn suggest<L: MetadataLookup>(
    lookup: &L,
    brand: &str,
    model: &str,
) -> Result<Suggestion, LookupError> {
    let query = format!("{brand} {model}").trim().to_string();
    if query.is_empty() {
        return Err(LookupError::Other("brand or model is required".to_string()));
    }
    let text = lookup.lookup(&query).await?;
    Ok(Suggestion {
        store_url: extract_labeled_url(&text, STORE_LABEL),
        image_url: extract_labeled_url(&text, IMAGE_LABEL),
    })
}

/// Replace a record's description with a polished rewrite of it.
pub async fn polish_description<W: DescriptionWriter>(
    store: &RecordStore,
    writer: &W,
    id: &str,
) -> Result<EquipmentRecord, EnrichError> {
    let record = store
        .get(id)?
        .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
    let polished = writer
        .polish(&record.display_name(), &record.description)
        .await?;
    let polished = polished.trim().to_string();
    if polished.is_empty() {
        return Err(LookupError::EmptyResponse.into());
    }
    let patch = RecordPatch {
        description: Some(polished),
        ..RecordPatch::default()
    };
    Ok(store.update(id, patch)?)
}
