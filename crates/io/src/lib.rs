// Tabular file reading
//
// Every supported file is read into one or more `Table`s: a delimited text
// file yields exactly one, a workbook yields one per sheet. Cells are plain
// strings; interpretation is left to the caller.

pub mod csv;
pub mod xlsx;

use std::fmt;
use std::path::Path;

/// Which reader handles a file, decided by extension (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Xlsx,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

/// One grid of cells: a header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// Sheet name for workbook sources; `None` for delimited text.
    pub sheet: Option<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(|r| r.as_slice())
    }

    /// Rows after the header row.
    pub fn data_rows(&self) -> &[Vec<String>] {
        if self.rows.is_empty() {
            &[]
        } else {
            &self.rows[1..]
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Human label used in log lines: the sheet name, or "table" for CSV.
    pub fn label(&self) -> &str {
        self.sheet.as_deref().unwrap_or("table")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Field delimiter for delimited text. `None` sniffs it from the content.
    pub delimiter: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The path is missing or cannot be opened/read.
    FileAccess(String),
    /// The bytes could not be parsed as the expected format.
    Format(String),
    /// No reader exists for this extension.
    Unsupported(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileAccess(msg) => write!(f, "cannot access file: {msg}"),
            Self::Format(msg) => write!(f, "cannot parse file: {msg}"),
            Self::Unsupported(ext) => write!(f, "unsupported file type: {ext}"),
        }
    }
}

impl std::error::Error for ReadError {}

fn unsupported(path: &Path) -> ReadError {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| "(none)".to_string());
    ReadError::Unsupported(ext)
}

/// Read every table in `path`.
pub fn read_tables(path: &Path, options: &ReadOptions) -> Result<Vec<Table>, ReadError> {
    match SourceKind::from_path(path) {
        Some(SourceKind::Csv) => csv::read_table(path, options).map(|t| vec![t]),
        Some(SourceKind::Xlsx) => xlsx::read_workbook(path),
        None => Err(unsupported(path)),
    }
}

/// Read only the header row of the first non-empty table, plus the delimiter
/// that was used (always `b','` for workbooks).
pub fn read_header_row(path: &Path, options: &ReadOptions) -> Result<(Vec<String>, u8), ReadError> {
    match SourceKind::from_path(path) {
        Some(SourceKind::Csv) => csv::read_first_row(path, options),
        Some(SourceKind::Xlsx) => {
            let tables = xlsx::read_workbook(path)?;
            let header = tables
                .iter()
                .find_map(|t| t.header().map(|h| h.to_vec()))
                .ok_or_else(|| ReadError::Format("no headers found in workbook".to_string()))?;
            Ok((header, b','))
        }
        None => Err(unsupported(path)),
    }
}
