//! Output formatting for snapshots.
//!
//! Supports pretty-printing, JSON serialization, and CSV rendering to any
//! writer. Nothing here touches the filesystem.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Write;
use tracing::debug;

use crate::record::{MergedDataset, SENTINEL, StudentRecord};

/// Column headers of the canonical table, in display order.
pub const COLUMNS: [&str; 12] = [
    "SNO",
    "USN",
    "First Name",
    "Java-35m",
    "Python-35m",
    "Machine Learning-30m",
    "Total",
    "Status",
    "Java Status",
    "Python Status",
    "ML Status",
    "ClassName",
];

/// Logs a dataset using Rust's debug pretty-print format.
pub fn print_pretty(dataset: &MergedDataset) {
    debug!("{:#?}", dataset);
}

/// Serializes any view as pretty-printed JSON.
pub fn to_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn text_or_sentinel(value: &Option<String>) -> String {
    value.as_deref().unwrap_or(SENTINEL).to_string()
}

/// Cells of one record in [`COLUMNS`] order. Marks go through `Display`,
/// so a whole-number mark keeps the sheet's spelling.
fn csv_row(record: &StudentRecord) -> [String; 12] {
    [
        record.sequence_number.to_string(),
        text_or_sentinel(&record.usn),
        text_or_sentinel(&record.first_name),
        record.java_mark.to_string(),
        record.python_mark.to_string(),
        record.ml_mark.to_string(),
        record.total_mark.to_string(),
        text_or_sentinel(&record.overall_status),
        text_or_sentinel(&record.java_status),
        text_or_sentinel(&record.python_status),
        text_or_sentinel(&record.ml_status),
        record.class_name.clone(),
    ]
}

/// Writes the dataset as CSV with a header row, absent values as `-`.
pub fn write_csv<W: Write>(writer: W, dataset: &MergedDataset) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(COLUMNS)?;
    for record in dataset.records() {
        writer.write_record(csv_row(record))?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{StudentRecord, Value};

    fn dataset() -> MergedDataset {
        MergedDataset::new(vec![StudentRecord {
            sequence_number: 1,
            usn: Some("1CD21".to_string()),
            first_name: None,
            java_mark: Value::Number(28.0),
            python_mark: Value::Missing,
            ml_mark: Value::Text("AB".to_string()),
            total_mark: Value::Number(61.5),
            overall_status: Some("Good".to_string()),
            java_status: Some("Good".to_string()),
            python_status: Some("Poor".to_string()),
            ml_status: Some("Poor".to_string()),
            class_name: "CSD-A".to_string(),
        }])
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&dataset());
    }

    #[test]
    fn test_write_csv_renders_sentinels() {
        let mut out = Vec::new();
        write_csv(&mut out, &dataset()).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], COLUMNS.join(","));
        assert_eq!(lines[1], "1,1CD21,-,28,-,AB,61.5,Good,Good,Poor,Poor,CSD-A");
    }

    #[test]
    fn test_write_csv_keeps_whole_marks_as_written() {
        let mut data = dataset();
        data.records_mut()[0].total_mark = Value::Number(85.0);

        let mut out = Vec::new();
        write_csv(&mut out, &data).unwrap();

        let text = String::from_utf8(out).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains(",28,"));
        assert!(row.contains(",85,"));
        assert!(!row.contains(".0"));
    }

    #[test]
    fn test_write_csv_empty_dataset_has_header() {
        let mut out = Vec::new();
        write_csv(&mut out, &MergedDataset::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_to_json_uses_display_names() {
        let json = to_json(&dataset()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0]["USN"], "1CD21");
        assert_eq!(parsed[0]["First Name"], "-");
        assert_eq!(parsed[0]["Java-35m"], 28.0);
        assert_eq!(parsed[0]["Python-35m"], "-");
    }
}
