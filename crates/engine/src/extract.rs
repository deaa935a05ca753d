// Record extraction: one source's tables in, canonical records out.

use std::collections::HashSet;
use std::path::Path;

use listmerge_io::{ReadOptions, Table};

use crate::error::MergeError;
use crate::headers::{ambiguity_warnings, sanitize_all, ColumnMap};
use crate::log::LogSink;
use crate::model::{Overflow, Record};
use crate::writer::is_canonical_label;

/// Individually logged short rows per table; the rest are only counted.
const ROW_SHAPE_LOG_LIMIT: usize = 10;

/// Result of extracting one table (a CSV file or one workbook sheet).
#[derive(Debug, Default)]
pub struct TableExtraction {
    pub records: Vec<Record>,
    pub rows_skipped: usize,
}

/// Result of extracting every table in a source.
#[derive(Debug, Default)]
pub struct SourceExtraction {
    pub records: Vec<Record>,
    pub rows_skipped: usize,
    /// Sheets that were skipped for schema reasons while others succeeded.
    pub table_errors: Vec<MergeError>,
}

/// Turn a header row plus data rows into records.
///
/// Rows shorter than the required columns are skipped and counted; every other
/// row yields exactly one record, in input order.
pub fn extract_rows(
    source: &Path,
    sheet: Option<&str>,
    raw_headers: &[String],
    rows: &[Vec<String>],
    log: &dyn LogSink,
) -> Result<TableExtraction, MergeError> {
    let headers = sanitize_all(raw_headers);

    let columns = ColumnMap::resolve(&headers).map_err(|missing| MergeError::Schema {
        path: source.to_path_buf(),
        sheet: sheet.map(str::to_string),
        missing,
    })?;

    for warning in ambiguity_warnings(&headers) {
        log.warn(format!("{}: {warning}", source.display()));
    }

    // Keys consumed by canonical fields never appear in overflow
    let mut consumed: HashSet<&str> = HashSet::new();
    consumed.insert(headers[columns.name].as_str());
    consumed.insert(headers[columns.email].as_str());
    if let Some(org) = columns.organization {
        consumed.insert(headers[org].as_str());
    }

    // Overflow key per column, None for consumed ones. An unresolved column
    // named like a canonical field is renamed so output keeps it separate.
    let overflow_keys: Vec<Option<String>> = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            if consumed.contains(header.as_str()) {
                None
            } else if is_canonical_label(header) {
                let key = format!("{header} (column {})", idx + 1);
                log.warn(format!(
                    "{}: extra '{header}' column kept as '{key}'",
                    source.display()
                ));
                Some(key)
            } else {
                Some(header.clone())
            }
        })
        .collect();

    let required = columns.required_width();
    let mut out = TableExtraction::default();

    for (i, row) in rows.iter().enumerate() {
        if row.len() < required {
            out.rows_skipped += 1;
            if out.rows_skipped <= ROW_SHAPE_LOG_LIMIT {
                let err = MergeError::RowShape {
                    path: source.to_path_buf(),
                    sheet: sheet.map(str::to_string),
                    // +1 for the header row, +1 for 1-based numbering
                    row: i + 2,
                    width: row.len(),
                    required,
                };
                log.warn(format!("skipping {err}"));
            }
            continue;
        }

        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");

        let mut overflow = Overflow::new();
        for (idx, key) in overflow_keys.iter().enumerate() {
            if let Some(key) = key {
                overflow.insert(key.as_str(), cell(idx));
            }
        }

        out.records.push(Record::new(
            cell(columns.name),
            cell(columns.email),
            columns.organization.map(cell).unwrap_or(""),
            overflow,
            source,
        ));
    }

    if out.rows_skipped > ROW_SHAPE_LOG_LIMIT {
        log.warn(format!(
            "{}: {} more short rows skipped",
            source.display(),
            out.rows_skipped - ROW_SHAPE_LOG_LIMIT
        ));
    }

    Ok(out)
}

/// Extract every table of a source, each with its own header resolution.
///
/// A table whose schema does not resolve is logged and skipped. The source as a
/// whole fails only when no table produced a usable schema.
pub fn extract_tables(
    source: &Path,
    tables: &[Table],
    log: &dyn LogSink,
) -> Result<SourceExtraction, MergeError> {
    let mut out = SourceExtraction::default();
    let mut usable = 0usize;

    for table in tables {
        let Some(header) = table.header() else {
            log.warn(format!("No data found in {} ({})", source.display(), table.label()));
            continue;
        };

        match extract_rows(source, table.sheet.as_deref(), header, table.data_rows(), log) {
            Ok(extraction) => {
                usable += 1;
                out.records.extend(extraction.records);
                out.rows_skipped += extraction.rows_skipped;
            }
            Err(err) => {
                log.warn(format!("{err}, skipping..."));
                out.table_errors.push(err);
            }
        }
    }

    if usable == 0 && !out.table_errors.is_empty() {
        return Err(out.table_errors.remove(0));
    }

    Ok(out)
}

/// Read a source through `listmerge-io` and extract its records.
pub fn load_source(
    path: &Path,
    options: &ReadOptions,
    log: &dyn LogSink,
) -> Result<SourceExtraction, MergeError> {
    let tables = listmerge_io::read_tables(path, options).map_err(|e| MergeError::from_read(path, e))?;
    extract_tables(path, &tables, log)
}
