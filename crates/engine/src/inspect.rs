// Header inspection: what a file's columns look like and how they resolve.

use std::path::{Path, PathBuf};

use listmerge_io::ReadOptions;
use serde::Serialize;

use crate::error::MergeError;
use crate::headers::{ambiguity_warnings, resolve, sanitize_all};
use crate::model::CanonicalField;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableHeaders {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub headers: Vec<String>,
    pub name: Option<usize>,
    pub email: Option<usize>,
    pub organization: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl TableHeaders {
    /// Whether rows from this table can be extracted.
    pub fn is_usable(&self) -> bool {
        self.name.is_some() && self.email.is_some()
    }

    pub fn index_of(&self, field: CanonicalField) -> Option<usize> {
        match field {
            CanonicalField::Name => self.name,
            CanonicalField::Email => self.email,
            CanonicalField::Organization => self.organization,
        }
    }
}

/// Header row and resolved canonical columns of every non-empty table in `path`.
pub fn inspect_headers(path: &Path, options: &ReadOptions) -> Result<Vec<TableHeaders>, MergeError> {
    let tables = listmerge_io::read_tables(path, options).map_err(|e| MergeError::from_read(path, e))?;

    Ok(tables
        .iter()
        .filter_map(|table| {
            let headers = sanitize_all(table.header()?);
            Some(TableHeaders {
                path: path.to_path_buf(),
                sheet: table.sheet.clone(),
                name: resolve(&headers, CanonicalField::Name.keyword()),
                email: resolve(&headers, CanonicalField::Email.keyword()),
                organization: resolve(&headers, CanonicalField::Organization.keyword()),
                warnings: ambiguity_warnings(&headers),
                headers,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_resolved_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(&path, "\"Email Address\", Full Name ,Work Email\na@x.com,A,b@x.com\n").unwrap();

        let tables = inspect_headers(&path, &ReadOptions::default()).unwrap();
        assert_eq!(tables.len(), 1);

        let t = &tables[0];
        assert_eq!(t.headers, vec!["Email Address", "Full Name", "Work Email"]);
        assert_eq!(t.email, Some(0));
        assert_eq!(t.name, Some(1));
        assert_eq!(t.organization, None);
        assert!(t.is_usable());
        assert_eq!(t.warnings.len(), 1);
    }

    #[test]
    fn empty_file_has_no_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "").unwrap();
        assert!(inspect_headers(&path, &ReadOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn unsupported_extension() {
        let err = inspect_headers(Path::new("notes.txt"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, MergeError::UnsupportedFileType { .. }));
    }
}
