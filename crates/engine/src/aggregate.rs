// Concurrent aggregation
//
// Sources are read by a bounded set of workers. Each worker hands its
// source's outcome to a single consumer task, which files it into the slot
// for that source's enumeration position. Once every worker is done (or the
// run is cancelled) the slots are merged in enumeration order, so when two
// sources share an email the earlier source always wins.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use listmerge_io::ReadOptions;
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::MergeError;
use crate::extract::{load_source, SourceExtraction};
use crate::log::LogSink;
use crate::model::AggregatedSet;

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Maximum number of sources read at once.
    pub workers: usize,
    /// Per-source deadline. `None` waits indefinitely.
    pub source_timeout: Option<Duration>,
    /// Capacity of the worker → consumer handoff queue.
    pub channel_capacity: usize,
    pub read: ReadOptions,
    pub cancel: CancellationToken,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            source_timeout: Some(Duration::from_secs(300)),
            channel_capacity: 1,
            read: ReadOptions::default(),
            cancel: CancellationToken::new(),
        }
    }
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// How one source ended up.
#[derive(Debug)]
pub enum SourceOutcome {
    Done(SourceExtraction),
    Failed(MergeError),
    /// Cancelled before it produced a result.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub path: PathBuf,
    pub status: SourceStatus,
    pub records: usize,
    pub rows_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct Aggregation {
    pub set: AggregatedSet,
    /// One entry per input source, in enumeration order.
    pub sources: Vec<SourceReport>,
    /// Records extracted before deduplication.
    pub raw_records: usize,
    pub rows_skipped: usize,
    pub cancelled: bool,
}

impl Aggregation {
    pub fn count(&self, status: SourceStatus) -> usize {
        self.sources.iter().filter(|s| s.status == status).count()
    }
}

/// Read every source concurrently and merge the records, first writer wins in
/// enumeration order. Per-source failures are logged and excluded; this never
/// fails as a whole.
pub async fn aggregate(
    sources: &[PathBuf],
    options: &AggregateOptions,
    log: Arc<dyn LogSink>,
) -> Aggregation {
    let started = Instant::now();
    let total = sources.len();
    let cancel = options.cancel.clone();

    log.info(format!("Total files to process: {total}"));

    let (tx, mut rx) = mpsc::channel::<(usize, SourceOutcome)>(options.channel_capacity.max(1));

    // The consumer exclusively owns the slots. It runs until every sender is
    // gone; after cancellation workers still report, so finished work is kept.
    let consumer = tokio::spawn(async move {
        let mut slots: Vec<Option<SourceOutcome>> = (0..total).map(|_| None).collect();
        while let Some((slot, outcome)) = rx.recv().await {
            slots[slot] = Some(outcome);
        }
        slots
    });

    let permits = Arc::new(Semaphore::new(options.workers.max(1)));

    for (slot, path) in sources.iter().enumerate() {
        // Backpressure: no new worker until one finishes
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let tx = tx.clone();
        let log = Arc::clone(&log);
        let cancel = cancel.clone();
        let path = path.clone();
        let read = options.read;
        let timeout = options.source_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => SourceOutcome::Cancelled,
                outcome = read_source(path, read, timeout, log) => outcome,
            };
            // Only fails if the consumer panicked
            let _ = tx.send((slot, outcome)).await;
        });
    }
    drop(tx);

    let slots = match consumer.await {
        Ok(slots) => slots,
        Err(e) => {
            log.error(format!("aggregation consumer failed: {e}"));
            (0..total).map(|_| None).collect()
        }
    };

    let cancelled = cancel.is_cancelled();
    if cancelled {
        log.warn("Run cancelled; finishing with the sources completed so far".to_string());
    }

    let aggregation = merge_slots(sources, slots);
    debug!(
        sources = total,
        unique = aggregation.set.len(),
        elapsed = ?started.elapsed(),
        "aggregation finished"
    );
    Aggregation { cancelled, ..aggregation }
}

async fn read_source(
    path: PathBuf,
    read: ReadOptions,
    timeout: Option<Duration>,
    log: Arc<dyn LogSink>,
) -> SourceOutcome {
    log.info(format!("Processing file: {}", path.display()));
    let start = Instant::now();

    // Readers are synchronous; keep them off the async workers
    let job = tokio::task::spawn_blocking({
        let path = path.clone();
        let log = Arc::clone(&log);
        move || load_source(&path, &read, log.as_ref())
    });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, job).await {
            Ok(joined) => joined,
            Err(_) => {
                let err = MergeError::Timeout { path, after: limit };
                log.error(format!("{err}, skipping..."));
                return SourceOutcome::Failed(err);
            }
        },
        None => job.await,
    };

    match joined {
        Ok(Ok(extraction)) => {
            debug!(path = %path.display(), records = extraction.records.len(), elapsed = ?start.elapsed(), "source read");
            log.info(format!(
                "Loaded {} records from file: {}",
                extraction.records.len(),
                path.display()
            ));
            SourceOutcome::Done(extraction)
        }
        Ok(Err(err)) => {
            log.warn(format!("{err}, skipping..."));
            SourceOutcome::Failed(err)
        }
        Err(join_err) => {
            let err = MergeError::Worker {
                path,
                message: join_err.to_string(),
            };
            log.error(err.to_string());
            SourceOutcome::Failed(err)
        }
    }
}

/// Merge per-source outcomes in slot order. Empty slots count as cancelled.
pub fn merge_slots(sources: &[PathBuf], slots: Vec<Option<SourceOutcome>>) -> Aggregation {
    let mut set = AggregatedSet::new();
    let mut reports = Vec::with_capacity(sources.len());
    let mut raw_records = 0;
    let mut rows_skipped = 0;

    for (path, slot) in sources.iter().zip(slots) {
        let report = match slot {
            Some(SourceOutcome::Done(extraction)) => {
                let count = extraction.records.len();
                raw_records += count;
                rows_skipped += extraction.rows_skipped;
                for record in extraction.records {
                    set.insert_if_absent(record);
                }
                SourceReport {
                    path: path.clone(),
                    status: SourceStatus::Ok,
                    records: count,
                    rows_skipped: extraction.rows_skipped,
                    error: None,
                }
            }
            Some(SourceOutcome::Failed(err)) => SourceReport {
                path: path.clone(),
                status: if matches!(err, MergeError::Timeout { .. }) {
                    SourceStatus::TimedOut
                } else {
                    SourceStatus::Failed
                },
                records: 0,
                rows_skipped: 0,
                error: Some(err.to_string()),
            },
            Some(SourceOutcome::Cancelled) | None => SourceReport {
                path: path.clone(),
                status: SourceStatus::Cancelled,
                records: 0,
                rows_skipped: 0,
                error: None,
            },
        };
        reports.push(report);
    }

    Aggregation {
        set,
        sources: reports,
        raw_records,
        rows_skipped,
        cancelled: false,
    }
}
