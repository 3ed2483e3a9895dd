//! CSV parser for sheet exports.

use csv::ReaderBuilder;

use crate::record::{RawRow, Value};

/// Decodes comma-separated text with a header row into raw rows.
///
/// Header cells become the raw column names; each data cell is keyed to its
/// header by position. Empty cells are left out of the row, columns without
/// a header are ignored, and rows with no cells at all are skipped. Short
/// rows simply lack their trailing columns.
///
/// # Errors
///
/// Returns an error if the body is not valid UTF-8 CSV.
pub fn parse_table(bytes: &[u8]) -> Result<Vec<RawRow>, csv::Error> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.trim().is_empty())
            .filter_map(|(header, cell)| Value::from_cell(cell).map(|v| (header.clone(), v)))
            .collect();

        if row.is_empty() {
            continue;
        }
        rows.push(row);
    }

    Ok(rows)
}
