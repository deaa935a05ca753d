// Run entry points
//
// `run_combine` and `run_filter` are the whole surface a front end needs:
// hand them the input selection and output path, drain the log sink, and
// look at the returned report or error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::aggregate::{aggregate, AggregateOptions, Aggregation, SourceReport, SourceStatus};
use crate::error::MergeError;
use crate::filter::{filter_records, load_reference};
use crate::log::LogSink;
use crate::model::Record;
use crate::sources::enumerate;
use crate::writer::{
    default_headers, generated_output_path, has_csv_extension, write_records, WriteMode, WriteSummary,
};

/// What to read: explicit files, or a file/directory to discover them from.
#[derive(Debug, Clone, Default)]
pub struct SourceSpec {
    pub files: Vec<PathBuf>,
    pub root: Option<PathBuf>,
}

impl SourceSpec {
    pub fn files(files: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            root: None,
        }
    }

    pub fn root(root: impl Into<PathBuf>) -> Self {
        Self {
            files: Vec::new(),
            root: Some(root.into()),
        }
    }
}

/// What to do when an append target's header row has no Name/Email columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompatiblePolicy {
    #[default]
    Abort,
    /// Replace the target with a freshly created table.
    Overwrite,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub aggregate: AggregateOptions,
    pub mode: WriteMode,
    pub on_incompatible: IncompatiblePolicy,
    /// In append mode, create the target if it does not exist yet.
    pub create_missing: bool,
    /// Output header row. `None` uses the canonical fields plus every overflow header.
    pub columns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub output: PathBuf,
    pub mode: WriteMode,
    pub sources: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub sources_timed_out: usize,
    pub sources_cancelled: usize,
    pub raw_records: usize,
    pub rows_skipped: usize,
    pub unique_records: usize,
    pub duplicates_dropped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_out: Option<usize>,
    pub rows_written: usize,
    pub headers: Vec<String>,
    pub cancelled: bool,
    pub source_reports: Vec<SourceReport>,
}

impl RunReport {
    fn new(aggregation: &Aggregation, written: &WriteSummary) -> Self {
        Self {
            output: written.path.clone(),
            mode: written.mode,
            sources: aggregation.sources.len(),
            sources_ok: aggregation.count(SourceStatus::Ok),
            sources_failed: aggregation.count(SourceStatus::Failed),
            sources_timed_out: aggregation.count(SourceStatus::TimedOut),
            sources_cancelled: aggregation.count(SourceStatus::Cancelled),
            raw_records: aggregation.raw_records,
            rows_skipped: aggregation.rows_skipped,
            unique_records: aggregation.set.len(),
            duplicates_dropped: aggregation.set.duplicates(),
            reference_size: None,
            filtered_out: None,
            rows_written: written.rows_written,
            headers: written.headers.clone(),
            cancelled: aggregation.cancelled,
            source_reports: aggregation.sources.clone(),
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} of {} source(s) read, {} unique record(s) from {} ({} duplicate(s) dropped)",
            self.sources_ok, self.sources, self.unique_records, self.raw_records, self.duplicates_dropped
        );
        if let Some(filtered) = self.filtered_out {
            line.push_str(&format!(", {filtered} filtered out"));
        }
        line.push_str(&format!(", {} row(s) written to {}", self.rows_written, self.output.display()));
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Read, deduplicate and write every source.
pub async fn run_combine(
    spec: &SourceSpec,
    output: &Path,
    options: &RunOptions,
    log: Arc<dyn LogSink>,
) -> Result<RunReport, MergeError> {
    check_output(output)?;

    let sources = discover(spec, log.as_ref())?;
    let aggregation = aggregate(&sources, &options.aggregate, Arc::clone(&log)).await;

    let records = aggregation.set.records().to_vec();
    let written = write_output(output, records, options, Arc::clone(&log)).await?;

    log.info(format!(
        "Processing completed, duplicates removed! Output file saved to {}",
        written.path.display()
    ));
    let report = RunReport::new(&aggregation, &written);
    info!(unique = report.unique_records, rows = report.rows_written, "combine finished");
    Ok(report)
}

/// Like [`run_combine`], but drop records whose email appears in `reference`.
///
/// The reference list is loaded before any source is read; failing to load it
/// aborts the run. If `output` is an existing directory the file name is
/// derived from the first input.
pub async fn run_filter(
    spec: &SourceSpec,
    reference: &Path,
    output: &Path,
    options: &RunOptions,
    log: Arc<dyn LogSink>,
) -> Result<RunReport, MergeError> {
    let reference_set = {
        let path = reference.to_path_buf();
        let read = options.aggregate.read;
        let log = Arc::clone(&log);
        tokio::task::spawn_blocking(move || load_reference(&path, &read, log.as_ref()))
            .await
            .map_err(|e| {
                MergeError::Reference(Box::new(MergeError::Worker {
                    path: reference.to_path_buf(),
                    message: e.to_string(),
                }))
            })??
    };

    let sources = discover(spec, log.as_ref())?;

    let output = if output.is_dir() {
        match sources.first() {
            Some(first) => generated_output_path(first, output),
            None => return Err(MergeError::NoSources),
        }
    } else {
        output.to_path_buf()
    };
    check_output(&output)?;

    let aggregation = aggregate(&sources, &options.aggregate, Arc::clone(&log)).await;
    if aggregation.raw_records == 0 {
        log.warn("No valid input records found; the output will only hold a header row".to_string());
    }

    log.info(format!(
        "Filtering records based on database file: {}",
        reference_set.source().display()
    ));
    let kept = filter_records(aggregation.set.records(), &reference_set);
    let filtered_out = aggregation.set.len() - kept.len();
    log.info(format!(
        "Filtered {filtered_out} records based on database file, {} remaining",
        kept.len()
    ));

    let written = write_output(&output, kept, options, Arc::clone(&log)).await?;
    log.info(format!(
        "Wrote {} records to output file: {}",
        written.rows_written,
        written.path.display()
    ));
    log.info("Email filtering completed successfully!".to_string());

    let mut report = RunReport::new(&aggregation, &written);
    report.reference_size = Some(reference_set.len());
    report.filtered_out = Some(filtered_out);
    info!(kept = report.rows_written, filtered_out, "filter finished");
    Ok(report)
}

fn check_output(output: &Path) -> Result<(), MergeError> {
    if has_csv_extension(output) {
        Ok(())
    } else {
        Err(MergeError::write(output, "output file must have a .csv extension"))
    }
}

fn discover(spec: &SourceSpec, log: &dyn LogSink) -> Result<Vec<PathBuf>, MergeError> {
    let sources = enumerate(&spec.files, spec.root.as_deref(), log)?;
    if sources.is_empty() {
        return Err(MergeError::NoSources);
    }
    Ok(sources)
}

/// Write on a blocking thread, applying the append policies.
async fn write_output(
    output: &Path,
    records: Vec<Record>,
    options: &RunOptions,
    log: Arc<dyn LogSink>,
) -> Result<WriteSummary, MergeError> {
    let path = output.to_path_buf();
    let headers = options
        .columns
        .clone()
        .unwrap_or_else(|| default_headers(&records));
    let read = options.aggregate.read;

    let mut mode = options.mode;
    if mode == WriteMode::Append && options.create_missing && !path.exists() {
        log.info(format!("{} does not exist yet, creating it", path.display()));
        mode = WriteMode::Create;
    }
    let on_incompatible = options.on_incompatible;

    tokio::task::spawn_blocking(move || {
        match write_records(&path, &headers, &records, mode, &read) {
            Err(err @ MergeError::IncompatibleHeaders { .. })
                if on_incompatible == IncompatiblePolicy::Overwrite =>
            {
                log.warn(format!("{err}; overwriting it"));
                write_records(&path, &headers, &records, WriteMode::Create, &read)
            }
            other => other,
        }
    })
    .await
    .map_err(|e| MergeError::write(output, e))?
}
