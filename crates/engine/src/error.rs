use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use listmerge_io::ReadError;

use crate::model::CanonicalField;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Path missing or unreadable.
    FileAccess { path: PathBuf, message: String },
    /// The reader could not parse the file.
    Format { path: PathBuf, message: String },
    /// A required canonical column is not resolvable in a table.
    Schema {
        path: PathBuf,
        sheet: Option<String>,
        missing: Vec<CanonicalField>,
    },
    /// A data row is shorter than the required column indices.
    RowShape {
        path: PathBuf,
        sheet: Option<String>,
        /// 1-based line/row number, header row included.
        row: usize,
        width: usize,
        required: usize,
    },
    /// Extension has no reader.
    UnsupportedFileType { path: PathBuf },
    /// Append target's header row lacks the required canonical columns.
    IncompatibleHeaders { path: PathBuf, headers: Vec<String> },
    /// Destination cannot be created, opened or written.
    Write { path: PathBuf, message: String },
    /// A source exceeded its deadline.
    Timeout { path: PathBuf, after: Duration },
    /// The task reading a source died before producing a result.
    Worker { path: PathBuf, message: String },
    /// Nothing to read after enumeration.
    NoSources,
    /// The reference list could not be loaded; filtering has nothing to compare against.
    Reference(Box<MergeError>),
}

impl MergeError {
    pub(crate) fn from_read(path: &Path, err: ReadError) -> Self {
        let path = path.to_path_buf();
        match err {
            ReadError::FileAccess(message) => Self::FileAccess { path, message },
            ReadError::Format(message) => Self::Format { path, message },
            ReadError::Unsupported(_) => Self::UnsupportedFileType { path },
        }
    }

    pub(crate) fn write(path: &Path, err: impl fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Whether this error aborts a run. Everything else is logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleHeaders { .. } | Self::Write { .. } | Self::NoSources | Self::Reference(_)
        )
    }
}

fn sheet_suffix(sheet: &Option<String>) -> String {
    match sheet {
        Some(name) => format!(" (sheet '{name}')"),
        None => String::new(),
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileAccess { path, message } => {
                write!(f, "cannot access {}: {message}", path.display())
            }
            Self::Format { path, message } => {
                write!(f, "cannot parse {}: {message}", path.display())
            }
            Self::Schema { path, sheet, missing } => {
                let names: Vec<&str> = missing.iter().map(|m| m.label()).collect();
                write!(
                    f,
                    "required columns ({}) not found in {}{}",
                    names.join(", "),
                    path.display(),
                    sheet_suffix(sheet)
                )
            }
            Self::RowShape { path, sheet, row, width, required } => write!(
                f,
                "row {row} of {}{} has {width} field(s), needs at least {required}",
                path.display(),
                sheet_suffix(sheet)
            ),
            Self::UnsupportedFileType { path } => {
                write!(f, "unsupported file type: {}", path.display())
            }
            Self::IncompatibleHeaders { path, headers } => write!(
                f,
                "{} has no Name/Email columns in its header row [{}]",
                path.display(),
                headers.join(", ")
            ),
            Self::Write { path, message } => {
                write!(f, "cannot write {}: {message}", path.display())
            }
            Self::Timeout { path, after } => {
                write!(f, "gave up on {} after {}s", path.display(), after.as_secs())
            }
            Self::Worker { path, message } => {
                write!(f, "reading {} failed: {message}", path.display())
            }
            Self::NoSources => write!(f, "no CSV or XLSX files found in the selected input"),
            Self::Reference(inner) => write!(f, "reference file: {inner}"),
        }
    }
}

impl std::error::Error for MergeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_policy() {
        let p = PathBuf::from("a.csv");
        assert!(!MergeError::FileAccess { path: p.clone(), message: "x".into() }.is_fatal());
        assert!(!MergeError::Schema { path: p.clone(), sheet: None, missing: vec![CanonicalField::Email] }.is_fatal());
        assert!(!MergeError::UnsupportedFileType { path: p.clone() }.is_fatal());
        assert!(MergeError::Write { path: p.clone(), message: "x".into() }.is_fatal());
        assert!(MergeError::IncompatibleHeaders { path: p.clone(), headers: vec![] }.is_fatal());
        assert!(MergeError::NoSources.is_fatal());
        assert!(MergeError::Reference(Box::new(MergeError::UnsupportedFileType { path: p })).is_fatal());
    }

    #[test]
    fn schema_message_names_columns_and_sheet() {
        let err = MergeError::Schema {
            path: PathBuf::from("people.xlsx"),
            sheet: Some("Guests".into()),
            missing: vec![CanonicalField::Name, CanonicalField::Email],
        };
        assert_eq!(
            err.to_string(),
            "required columns (Name, Email) not found in people.xlsx (sheet 'Guests')"
        );
    }

    #[test]
    fn read_errors_map_into_taxonomy() {
        let path = Path::new("x.txt");
        assert!(matches!(
            MergeError::from_read(path, ReadError::Unsupported(".txt".into())),
            MergeError::UnsupportedFileType { .. }
        ));
        assert!(matches!(
            MergeError::from_read(path, ReadError::Format("bad".into())),
            MergeError::Format { .. }
        ));
    }
}
