// Excel workbook reading

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};

use crate::{ReadError, Table};

/// Read every sheet of a workbook (xlsx, xls, xlsb, ods) as a table of text cells.
///
/// Sheets are returned in workbook order. An empty sheet yields an empty table
/// rather than being dropped, so callers can report it.
pub fn read_workbook(path: &Path) -> Result<Vec<Table>, ReadError> {
    // calamine folds "not found" into its own error type; check first so a
    // missing file is reported as an access problem, not a format problem.
    std::fs::metadata(path)
        .map_err(|e| ReadError::FileAccess(format!("{}: {e}", path.display())))?;

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| ReadError::Format(format!("failed to open Excel file: {e}")))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut tables = Vec::with_capacity(sheet_names.len());

    for sheet_name in &sheet_names {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| ReadError::Format(format!("failed to read sheet '{sheet_name}': {e}")))?;

        // Range start offset (data may not begin at column A)
        let (_, start_col) = range.start().unwrap_or((0, 0));

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(range.height());
        let mut header_width = 0;
        for row in range.rows() {
            let mut cells: Vec<String> = Vec::with_capacity(start_col as usize + row.len());
            cells.resize(start_col as usize, String::new());
            cells.extend(row.iter().map(cell_to_string));

            // The range is dense; drop padding past the last filled cell, but a
            // data row with content never gets narrower than the header row.
            while cells.last().is_some_and(|c| c.is_empty()) {
                cells.pop();
            }
            if rows.is_empty() {
                header_width = cells.len();
            } else if !cells.is_empty() && cells.len() < header_width {
                cells.resize(header_width, String::new());
            }
            rows.push(cells);
        }

        tables.push(Table {
            sheet: Some(sheet_name.clone()),
            rows,
        });
    }

    Ok(tables)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        // Serial value; the 1900 date system is assumed
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
