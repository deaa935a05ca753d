use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Canonical schema
// ---------------------------------------------------------------------------

/// The fixed fields every source row is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Name,
    Email,
    Organization,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 3] = [Self::Name, Self::Email, Self::Organization];

    /// Substring looked for in sanitized headers.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Organization => "organization",
        }
    }

    /// Header text used when writing output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Email => "Email",
            Self::Organization => "Organization",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Source columns that did not map to a canonical field, in source column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overflow {
    entries: Vec<(String, String)>,
}

impl Overflow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `header` to `value`. A repeated header keeps its first position and
    /// takes the later value.
    pub fn insert(&mut self, header: impl Into<String>, value: impl Into<String>) {
        let header = header.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(h, _)| *h == header) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((header, value)),
        }
    }

    pub fn get(&self, header: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(h, _)| h.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One normalized row. `email` is the identity key and is compared exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    name: String,
    email: String,
    org_name: String,
    overflow: Overflow,
    source_file: PathBuf,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        org_name: impl Into<String>,
        overflow: Overflow,
        source_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            org_name: org_name.into(),
            overflow,
            source_file: source_file.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Empty when the source had no organization column.
    pub fn org_name(&self) -> &str {
        &self.org_name
    }

    pub fn overflow(&self) -> &Overflow {
        &self.overflow
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn canonical(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Name => &self.name,
            CanonicalField::Email => &self.email,
            CanonicalField::Organization => &self.org_name,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Records keyed by email, first writer wins. Iteration follows insertion order.
#[derive(Debug, Default)]
pub struct AggregatedSet {
    index: HashMap<String, usize>,
    records: Vec<Record>,
    duplicates: usize,
}

impl AggregatedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` unless its email is already present. Returns whether it was kept.
    pub fn insert_if_absent(&mut self, record: Record) -> bool {
        if self.index.contains_key(record.email()) {
            self.duplicates += 1;
            return false;
        }
        self.index.insert(record.email().to_string(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, email: &str) -> Option<&Record> {
        self.index.get(email).map(|&i| &self.records[i])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records rejected because their email was already present.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, email: &str) -> Record {
        Record::new(name, email, "", Overflow::new(), "src.csv")
    }

    #[test]
    fn first_writer_wins() {
        let mut set = AggregatedSet::new();
        assert!(set.insert_if_absent(rec("Alice", "a@x.com")));
        assert!(!set.insert_if_absent(rec("Alice2", "a@x.com")));
        assert!(set.insert_if_absent(rec("Bob", "b@x.com")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.duplicates(), 1);
        assert_eq!(set.get("a@x.com").unwrap().name(), "Alice");
        assert_eq!(set.records()[1].email(), "b@x.com");
    }

    #[test]
    fn email_key_is_case_sensitive() {
        let mut set = AggregatedSet::new();
        set.insert_if_absent(rec("A", "a@x.com"));
        set.insert_if_absent(rec("A", "A@x.com"));
        set.insert_if_absent(rec("A", " a@x.com"));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn overflow_repeated_header_takes_later_value() {
        let mut o = Overflow::new();
        o.insert("City", "Paris");
        o.insert("Phone", "123");
        o.insert("City", "Lyon");
        assert_eq!(o.len(), 2);
        assert_eq!(o.get("City"), Some("Lyon"));
        assert_eq!(o.headers().collect::<Vec<_>>(), vec!["City", "Phone"]);
        assert_eq!(o.get("Zip"), None);
    }

    #[test]
    fn canonical_labels_round_trip_through_keywords() {
        for field in CanonicalField::ALL {
            assert!(field.label().to_lowercase().contains(field.keyword()));
        }
    }
}
