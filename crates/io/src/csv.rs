// CSV/TSV reading

use std::io::Read;
use std::path::Path;

use crate::{ReadError, ReadOptions, Table};

/// Read a delimited text file into a single table.
///
/// Parsing is lenient: rows may have differing field counts and stray quote
/// characters inside unquoted fields are kept as literal text.
pub fn read_table(path: &Path, options: &ReadOptions) -> Result<Table, ReadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(&content));
    parse_table(&content, delimiter)
}

/// Read just the first record of a delimited text file, returning it with
/// the delimiter that produced it.
pub fn read_first_row(path: &Path, options: &ReadOptions) -> Result<(Vec<String>, u8), ReadError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = options.delimiter.unwrap_or_else(|| sniff_delimiter(&content));

    let mut reader = reader_for(&content, delimiter);
    let row = match reader.records().next() {
        Some(record) => record
            .map_err(|e| ReadError::Format(e.to_string()))?
            .iter()
            .map(|f| f.to_string())
            .collect(),
        None => Vec::new(),
    };
    Ok((row, delimiter))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                reader_for(line, delim)
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        // Must produce >1 field on the first line to be viable
        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // Score: (number of lines with same field count as line 1) * field_count
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
///
/// A leading byte-order mark is dropped so it never ends up inside the first header.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ReadError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| ReadError::FileAccess(format!("{}: {e}", path.display())))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| ReadError::FileAccess(format!("{}: {e}", path.display())))?;

    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    Ok(match content.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => content,
    })
}

pub fn parse_table(content: &str, delimiter: u8) -> Result<Table, ReadError> {
    let mut reader = reader_for(content, delimiter);

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReadError::Format(e.to_string()))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    Ok(Table { sheet: None, rows })
}

fn reader_for(content: &str, delimiter: u8) -> ::csv::Reader<&[u8]> {
    ::csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "Name;Age;City\nAlice;30;Paris\nBob;25;London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "Name,Email,City\nAlice,a@x.com,Paris\nBob,b@x.com,London\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "Name\tEmail\nAlice\ta@x.com\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Name;Address;Email\n\"Doe, Jane\";\"123 Main St, Apt 4\";j@x.com\nBob;\"456 Elm\";b@x.com\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_single_column_defaults_to_comma() {
        assert_eq!(sniff_delimiter("email\na@x.com\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_variable_field_counts() {
        let table = parse_table("Email,Name,Org\na@x.com,Alice\nb@x.com,Bob,Acme,extra\n", b',').unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[1], vec!["a@x.com", "Alice"]);
        assert_eq!(table.rows[2].len(), 4);
    }

    #[test]
    fn test_bare_quote_inside_field_is_kept() {
        let table = parse_table("Name,Email\nJo \"JJ\" Doe,j@x.com\n", b',').unwrap();
        assert_eq!(table.rows[1][1], "j@x.com");
        assert!(table.rows[1][0].contains("JJ"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}Email,Name\na@x.com,Alice\n").unwrap();

        let table = read_table(&path, &ReadOptions::default()).unwrap();
        assert_eq!(table.rows[0][0], "Email");
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "José" with é encoded as 0xE9
        fs::write(&path, b"Name,Email\nJos\xe9,j@x.com\n").unwrap();

        let table = read_table(&path, &ReadOptions::default()).unwrap();
        assert_eq!(table.rows[1][0], "José");
    }

    #[test]
    fn test_missing_file_is_file_access_error() {
        let dir = tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv"), &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ReadError::FileAccess(_)));
    }

    #[test]
    fn test_first_row_reports_delimiter() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "Name;Email\nAlice;a@x.com\n").unwrap();

        let (row, delim) = read_first_row(&path, &ReadOptions::default()).unwrap();
        assert_eq!(row, vec!["Name", "Email"]);
        assert_eq!(delim, b';');
    }

    #[test]
    fn test_explicit_delimiter_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pipes.csv");
        fs::write(&path, "Name|Email\nAlice|a@x.com\n").unwrap();

        let options = ReadOptions { delimiter: Some(b',') };
        let table = read_table(&path, &options).unwrap();
        assert_eq!(table.rows[0], vec!["Name|Email"]);
    }
}
