// CSV output: create a fresh table or append rows to an existing one.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use listmerge_io::ReadOptions;
use serde::Serialize;

use crate::error::MergeError;
use crate::headers::{resolve, sanitize, sanitize_all, ColumnMap};
use crate::model::{CanonicalField, Record};

/// Header accepted as the organization column besides the canonical label.
const LEGACY_ORG_LABEL: &str = "OrgName";

/// Suffix of the file name generated for filter runs given only a directory.
pub const FILTERED_OUTPUT_SUFFIX: &str = "_filtered_output.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Truncate the destination and write a header row.
    #[default]
    Create,
    /// Add data rows under the destination's existing header row.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Column {
    Field(CanonicalField),
    /// Overflow lookup key (sanitized header).
    Overflow(String),
}

/// How each output column is filled from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    columns: Vec<Column>,
}

impl OutputLayout {
    /// Map output headers to record fields.
    ///
    /// A header naming a canonical field exactly (case-insensitive) takes it;
    /// fields still unassigned fall back to keyword matching. Each column maps
    /// to at most one field, claimed in the order Email, Name, Organization.
    pub fn for_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        let sanitized = sanitize_all(headers);
        let mut claimed: Vec<Option<CanonicalField>> = vec![None; sanitized.len()];

        let priority = [CanonicalField::Email, CanonicalField::Name, CanonicalField::Organization];

        for field in priority {
            let exact = sanitized.iter().enumerate().position(|(i, h)| {
                claimed[i].is_none()
                    && (h.eq_ignore_ascii_case(field.label())
                        || (field == CanonicalField::Organization
                            && h.eq_ignore_ascii_case(LEGACY_ORG_LABEL)))
            });
            if let Some(i) = exact {
                claimed[i] = Some(field);
            }
        }

        for field in priority {
            if claimed.contains(&Some(field)) {
                continue;
            }
            let free: Vec<&str> = sanitized
                .iter()
                .enumerate()
                .map(|(i, h)| if claimed[i].is_none() { h.as_str() } else { "" })
                .collect();
            if let Some(i) = resolve(&free, field.keyword()) {
                claimed[i] = Some(field);
            }
        }

        let columns = sanitized
            .into_iter()
            .zip(claimed)
            .map(|(header, field)| match field {
                Some(field) => Column::Field(field),
                None => Column::Overflow(header),
            })
            .collect();

        Self { columns }
    }

    pub fn field_at(&self, column: usize) -> Option<CanonicalField> {
        match self.columns.get(column) {
            Some(Column::Field(f)) => Some(*f),
            _ => None,
        }
    }

    pub fn row_for(&self, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| match column {
                Column::Field(field) => record.canonical(*field).to_string(),
                Column::Overflow(key) => record.overflow().get(key).unwrap_or("").to_string(),
            })
            .collect()
    }
}

/// Whether `header` is one of the labels the writer maps to a canonical field
/// by exact (case-insensitive) match.
pub fn is_canonical_label(header: &str) -> bool {
    CanonicalField::ALL
        .iter()
        .any(|f| header.eq_ignore_ascii_case(f.label()))
        || header.eq_ignore_ascii_case(LEGACY_ORG_LABEL)
}

/// `Name`, `Email`, `Organization`, then every overflow header in first-seen order.
pub fn default_headers(records: &[Record]) -> Vec<String> {
    let mut headers: Vec<String> = CanonicalField::ALL.iter().map(|f| f.label().to_string()).collect();
    let mut seen: HashSet<String> = headers.iter().cloned().collect();

    for record in records {
        for header in record.overflow().headers() {
            if seen.insert(header.to_string()) {
                headers.push(header.to_string());
            }
        }
    }
    headers
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub mode: WriteMode,
    /// Header row the data rows were laid out against.
    pub headers: Vec<String>,
    pub rows_written: usize,
}

/// Write `records` to `path`.
///
/// In create mode `headers` becomes the header row. In append mode the
/// destination's own header row is read back and used instead; it must
/// resolve Name and Email or [`MergeError::IncompatibleHeaders`] is returned
/// and the file is left untouched.
pub fn write_records(
    path: &Path,
    headers: &[String],
    records: &[Record],
    mode: WriteMode,
    options: &ReadOptions,
) -> Result<WriteSummary, MergeError> {
    match mode {
        WriteMode::Create => create(path, headers, records),
        WriteMode::Append => append(path, records, options),
    }
}

fn create(path: &Path, headers: &[String], records: &[Record]) -> Result<WriteSummary, MergeError> {
    let layout = OutputLayout::for_headers(headers);

    let mut writer = ::csv::WriterBuilder::new()
        .from_path(path)
        .map_err(|e| MergeError::write(path, e))?;

    writer
        .write_record(headers)
        .map_err(|e| MergeError::write(path, e))?;
    for record in records {
        writer
            .write_record(layout.row_for(record))
            .map_err(|e| MergeError::write(path, e))?;
    }
    writer.flush().map_err(|e| MergeError::write(path, e))?;

    Ok(WriteSummary {
        path: path.to_path_buf(),
        mode: WriteMode::Create,
        headers: headers.to_vec(),
        rows_written: records.len(),
    })
}

fn append(path: &Path, records: &[Record], options: &ReadOptions) -> Result<WriteSummary, MergeError> {
    if !path.is_file() {
        return Err(MergeError::write(path, "append target does not exist"));
    }

    let (existing, delimiter) =
        listmerge_io::read_header_row(path, options).map_err(|e| MergeError::write(path, e))?;

    if ColumnMap::resolve(&existing).is_err() {
        return Err(MergeError::IncompatibleHeaders {
            path: path.to_path_buf(),
            headers: existing.iter().map(|h| sanitize(h)).collect(),
        });
    }

    let layout = OutputLayout::for_headers(&existing);

    let mut file = OpenOptions::new()
        .read(true)
        .append(true)
        .open(path)
        .map_err(|e| MergeError::write(path, e))?;

    if !ends_with_newline(&mut file).map_err(|e| MergeError::write(path, e))? {
        file.write_all(b"\n").map_err(|e| MergeError::write(path, e))?;
    }

    let mut writer = ::csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(file);
    for record in records {
        writer
            .write_record(layout.row_for(record))
            .map_err(|e| MergeError::write(path, e))?;
    }
    writer.flush().map_err(|e| MergeError::write(path, e))?;

    Ok(WriteSummary {
        path: path.to_path_buf(),
        mode: WriteMode::Append,
        headers: existing,
        rows_written: records.len(),
    })
}

/// True for empty files too: there is nothing to glue onto.
fn ends_with_newline(file: &mut std::fs::File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// `<dir>/<first input stem>_filtered_output.csv`
pub fn generated_output_path(first_input: &Path, dir: &Path) -> PathBuf {
    let stem = first_input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    dir.join(format!("{stem}{FILTERED_OUTPUT_SUFFIX}"))
}

/// Output files must be named `*.csv` (any case).
pub fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}
