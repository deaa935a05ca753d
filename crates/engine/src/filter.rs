// Reference filtering: drop every record whose email appears in a reference list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use listmerge_io::{ReadOptions, Table};

use crate::error::MergeError;
use crate::headers::{ambiguity_warnings, resolve, sanitize_all};
use crate::log::LogSink;
use crate::model::{CanonicalField, Record};

/// Emails loaded from one reference file.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    emails: HashSet<String>,
    source: PathBuf,
}

impl ReferenceSet {
    pub fn new(emails: impl IntoIterator<Item = String>, source: impl Into<PathBuf>) -> Self {
        Self {
            emails: emails.into_iter().collect(),
            source: source.into(),
        }
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(email)
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Records whose email is not in `reference`, in input order.
pub fn filter_records(records: &[Record], reference: &ReferenceSet) -> Vec<Record> {
    records
        .iter()
        .filter(|r| !reference.contains(r.email()))
        .cloned()
        .collect()
}

/// Collect the email column of every table that has one.
///
/// Tables without an email header are skipped; if none has one the load fails
/// with a schema error for the file. A file with no header row at all is an
/// empty reference list.
pub fn collect_emails(
    path: &Path,
    tables: &[Table],
    log: &dyn LogSink,
) -> Result<ReferenceSet, MergeError> {
    let mut emails = HashSet::new();
    let mut usable = 0usize;
    let mut headed = 0usize;
    let mut first_sheet: Option<Option<String>> = None;

    for table in tables {
        let header = table
            .header()
            .filter(|h| h.iter().any(|cell| !cell.trim().is_empty()));
        let Some(header) = header else {
            continue;
        };
        headed += 1;
        let headers = sanitize_all(header);

        let Some(idx) = resolve(&headers, CanonicalField::Email.keyword()) else {
            first_sheet.get_or_insert_with(|| table.sheet.clone());
            if table.sheet.is_some() {
                log.warn(format!(
                    "{}: no email column in sheet '{}', skipping...",
                    path.display(),
                    table.label()
                ));
            }
            continue;
        };

        for warning in ambiguity_warnings(&headers)
            .into_iter()
            .filter(|w| w.starts_with(CanonicalField::Email.label()))
        {
            log.warn(format!("{}: {warning}", path.display()));
        }

        usable += 1;
        for row in table.data_rows() {
            if let Some(email) = row.get(idx) {
                emails.insert(email.clone());
            }
        }
    }

    if headed == 0 {
        log.warn(format!(
            "{}: database file is empty, no emails will be filtered",
            path.display()
        ));
    } else if usable == 0 {
        return Err(MergeError::Schema {
            path: path.to_path_buf(),
            sheet: first_sheet.flatten(),
            missing: vec![CanonicalField::Email],
        });
    }

    Ok(ReferenceSet {
        emails,
        source: path.to_path_buf(),
    })
}

/// Load the reference list. Any failure is fatal for the run and comes back
/// wrapped in [`MergeError::Reference`].
pub fn load_reference(
    path: &Path,
    options: &ReadOptions,
    log: &dyn LogSink,
) -> Result<ReferenceSet, MergeError> {
    let tables = listmerge_io::read_tables(path, options)
        .map_err(|e| MergeError::Reference(Box::new(MergeError::from_read(path, e))))?;

    let reference =
        collect_emails(path, &tables, log).map_err(|e| MergeError::Reference(Box::new(e)))?;

    log.info(format!(
        "Loaded {} emails from database file: {}",
        reference.len(),
        path.display()
    ));
    Ok(reference)
}
