//! Schema projector: normalized keys to the canonical student schema.

use crate::record::{NormalizedRow, StudentRecord, Value};

pub const USN: &str = "usn";
pub const FIRST_NAME: &str = "first name";
pub const JAVA_MARK: &str = "java-35m";
/// One class sheet carries a stray space in its Java header.
pub const JAVA_MARK_ALT: &str = "java- 35m";
pub const PYTHON_MARK: &str = "python-35m";
pub const ML_MARK: &str = "machine learning-30m";
pub const TOTAL: &str = "total";
pub const STATUS: &str = "status";
pub const JAVA_STATUS: &str = "java status";
pub const PYTHON_STATUS: &str = "python status";
pub const ML_STATUS: &str = "ml status";

fn value(row: &NormalizedRow, key: &str) -> Value {
    row.present(key).cloned().unwrap_or(Value::Missing)
}

fn text(row: &NormalizedRow, key: &str) -> Option<String> {
    row.present(key).and_then(Value::to_text)
}

/// Reads the canonical fields out of `row`.
///
/// Absent fields become [`Value::Missing`] or `None`; unknown source
/// columns are dropped. Never fails.
pub fn project(row: &NormalizedRow) -> StudentRecord {
    let java_mark = row
        .present(JAVA_MARK)
        .or_else(|| row.present(JAVA_MARK_ALT))
        .cloned()
        .unwrap_or(Value::Missing);

    StudentRecord {
        sequence_number: row.sequence_number,
        usn: text(row, USN),
        first_name: text(row, FIRST_NAME),
        java_mark,
        python_mark: value(row, PYTHON_MARK),
        ml_mark: value(row, ML_MARK),
        total_mark: value(row, TOTAL),
        overall_status: text(row, STATUS),
        java_status: text(row, JAVA_STATUS),
        python_status: text(row, PYTHON_STATUS),
        ml_status: text(row, ML_STATUS),
        class_name: row.class_label.clone(),
    }
}
