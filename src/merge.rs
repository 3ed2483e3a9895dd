//! Dataset merger: per-class row sets into one contiguous dataset.

use std::collections::BTreeSet;

use crate::projection::project;
use crate::record::{MergedDataset, NormalizedRow, Value};

/// Unions the per-class row sets, in the order given.
///
/// The field set of every output row is the union of the keys found in each
/// source's first row; a field a row lacks is filled with
/// [`Value::Missing`]. Sequence numbers are reassigned 1..=N across the
/// concatenation while each row keeps its class label.
pub fn merge_rows(sources: Vec<Vec<NormalizedRow>>) -> Vec<NormalizedRow> {
    let keys: BTreeSet<String> = sources
        .iter()
        .filter_map(|rows| rows.first())
        .flat_map(|row| row.fields.keys().cloned())
        .collect();

    sources
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, mut row)| NormalizedRow {
            fields: keys
                .iter()
                .map(|key| {
                    let value = row.fields.remove(key).unwrap_or(Value::Missing);
                    (key.clone(), value)
                })
                .collect(),
            class_label: row.class_label,
            sequence_number: index + 1,
        })
        .collect()
}

/// Merges and projects onto the canonical schema. Statuses are left as the
/// sources supplied them.
pub fn merge(sources: Vec<Vec<NormalizedRow>>) -> MergedDataset {
    MergedDataset::new(merge_rows(sources).iter().map(project).collect())
}
