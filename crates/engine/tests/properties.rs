// Property-based tests for header resolution, filtering, dedup and round trips.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use std::collections::HashSet;
use std::path::PathBuf;

use listmerge_engine::aggregate::{merge_slots, SourceOutcome};
use listmerge_engine::extract::{load_source, SourceExtraction};
use listmerge_engine::filter::{filter_records, ReferenceSet};
use listmerge_engine::headers::{resolve, sanitize};
use listmerge_engine::writer::{write_records, WriteMode};
use listmerge_engine::{MemorySink, Overflow, Record};
use listmerge_io::ReadOptions;
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config(default_cases: u32) -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default_cases),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Header text: usually noise, sometimes carrying a keyword in some casing,
/// sometimes padded or quoted.
fn arb_header() -> impl Strategy<Value = String> {
    let core = prop_oneof![
        3 => r"[a-zA-Z ]{0,10}",
        1 => r"[a-z]{0,4}(email|EMAIL|Email|eMaIl)[a-z ]{0,4}",
        1 => r"(Full |First |)(name|Name|NAME)",
    ];
    (core, prop_oneof![Just(""), Just("\""), Just("'")], r" {0,2}")
        .prop_map(|(core, quote, pad)| format!("{pad}{quote}{core}{quote}{pad}"))
}

/// Small email alphabet so duplicates are common.
fn arb_email() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => r"[a-e]@x\.com",
        1 => r"[A-E]@x\.com",
        1 => Just(String::new()),
    ]
}

fn record(email: &str) -> Record {
    Record::new("n", email, "", Overflow::new(), "in.csv")
}

/// Cell text safe for a comma-sniffed CSV: no newlines or other delimiter
/// candidates, but quotes and commas are fair game.
fn arb_cell() -> impl Strategy<Value = String> {
    r#"[a-zA-Z0-9@. ,"'-]{0,12}"#
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config(256))]

    #[test]
    fn resolve_returns_leftmost_match(headers in prop::collection::vec(arb_header(), 0..8)) {
        for keyword in ["email", "name", "organization"] {
            let expected = headers
                .iter()
                .position(|h| sanitize(h).to_lowercase().contains(keyword));
            prop_assert_eq!(resolve(&headers, keyword), expected);
        }
    }

    #[test]
    fn resolve_ignores_headers_after_first_match(
        prefix in prop::collection::vec(r"[a-df-z ]{0,6}", 0..5),
        suffix in prop::collection::vec(arb_header(), 0..5),
    ) {
        // Prefix letters exclude 'e', so no prefix header can contain "email"
        let mut headers = prefix.clone();
        headers.push("Work Email".to_string());
        headers.extend(suffix);
        prop_assert_eq!(resolve(&headers, "EMAIL"), Some(prefix.len()));
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config(256))]

    #[test]
    fn filter_is_idempotent(
        emails in prop::collection::vec(arb_email(), 0..30),
        reference in prop::collection::vec(arb_email(), 0..10),
    ) {
        let records: Vec<Record> = emails.iter().map(|e| record(e)).collect();
        let reference = ReferenceSet::new(reference, "ref.csv");

        let once = filter_records(&records, &reference);
        let twice = filter_records(&once, &reference);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn filter_obeys_set_difference(
        emails in prop::collection::vec(arb_email(), 0..30),
        reference in prop::collection::vec(arb_email(), 0..10),
    ) {
        let records: Vec<Record> = emails.iter().map(|e| record(e)).collect();
        let members: HashSet<&String> = reference.iter().collect();
        let in_reference = emails.iter().filter(|e| members.contains(e)).count();

        let kept = filter_records(&records, &ReferenceSet::new(reference.clone(), "ref.csv"));
        prop_assert_eq!(kept.len(), records.len() - in_reference);

        // Survivors keep their relative order
        let expected: Vec<&str> = emails
            .iter()
            .filter(|e| !members.contains(e))
            .map(String::as_str)
            .collect();
        let actual: Vec<&str> = kept.iter().map(|r| r.email()).collect();
        prop_assert_eq!(actual, expected);
    }
}

// ---------------------------------------------------------------------------
// Dedup
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config(256))]

    #[test]
    fn dedup_keeps_one_record_per_email(
        sources in prop::collection::vec(prop::collection::vec(arb_email(), 0..10), 1..6),
    ) {
        let paths: Vec<PathBuf> = (0..sources.len()).map(|i| PathBuf::from(format!("s{i}.csv"))).collect();
        let slots = sources
            .iter()
            .enumerate()
            .map(|(i, emails)| {
                Some(SourceOutcome::Done(SourceExtraction {
                    records: emails
                        .iter()
                        .map(|e| Record::new(format!("s{i}"), e.as_str(), "", Overflow::new(), paths[i].clone()))
                        .collect(),
                    ..SourceExtraction::default()
                }))
            })
            .collect();

        let raw: usize = sources.iter().map(Vec::len).sum();
        let distinct: HashSet<&String> = sources.iter().flatten().collect();

        let agg = merge_slots(&paths, slots);
        prop_assert_eq!(agg.raw_records, raw);
        prop_assert_eq!(agg.set.len(), distinct.len());
        prop_assert_eq!(agg.set.duplicates(), raw - distinct.len());

        // Earliest source holding an email owns it
        for email in distinct {
            let owner = sources.iter().position(|s| s.contains(email)).unwrap();
            prop_assert_eq!(agg.set.get(email).unwrap().name(), format!("s{owner}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config(64))]

    #[test]
    fn written_records_extract_unchanged(
        rows in prop::collection::vec((arb_cell(), arb_cell(), arb_cell(), arb_cell()), 1..12),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let records: Vec<Record> = rows
            .iter()
            .map(|(name, email, org, phone)| {
                let mut overflow = Overflow::new();
                overflow.insert("Phone", phone.as_str());
                Record::new(name.as_str(), email.as_str(), org.as_str(), overflow, "in.csv")
            })
            .collect();
        let headers: Vec<String> = ["Name", "Email", "Organization", "Phone"].iter().map(|h| h.to_string()).collect();

        write_records(&path, &headers, &records, WriteMode::Create, &ReadOptions::default()).unwrap();

        let log = MemorySink::new();
        let back = load_source(&path, &ReadOptions::default(), &log).unwrap().records;

        prop_assert_eq!(back.len(), records.len());
        for (a, b) in records.iter().zip(&back) {
            prop_assert_eq!(a.name(), b.name());
            prop_assert_eq!(a.email(), b.email());
            prop_assert_eq!(a.org_name(), b.org_name());
            prop_assert_eq!(a.overflow(), b.overflow());
        }
    }
}
