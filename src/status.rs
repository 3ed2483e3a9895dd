//! Per-subject status derivation and mark inference.

use crate::record::{StatusLevel, StudentRecord, Subject, Value};

/// Classifies a raw mark against the subject's maximum.
///
/// | Percentage | Status  |
/// |------------|---------|
/// | >= 80      | Good    |
/// | >= 60      | Average |
/// | < 60       | Poor    |
///
/// A mark that is missing, non-numeric, NaN, or negative is Poor without
/// computing a percentage.
pub fn status_from_mark(mark: &Value, max_mark: f64) -> StatusLevel {
    let mark = match mark.as_number() {
        Some(m) if !m.is_nan() && m >= 0.0 => m,
        _ => return StatusLevel::Poor,
    };

    match (mark / max_mark) * 100.0 {
        p if p >= 80.0 => StatusLevel::Good,
        p if p >= 60.0 => StatusLevel::Average,
        _ => StatusLevel::Poor,
    }
}

/// An explicit status wins verbatim (trimmed) when it is non-blank, even if
/// the mark says otherwise; otherwise the mark decides.
pub fn resolve_status(explicit: Option<&str>, mark: &Value, max_mark: f64) -> String {
    match explicit.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => status_from_mark(mark, max_mark).as_str().to_string(),
    }
}

fn derive_subject(record: &mut StudentRecord, subject: Subject) {
    let status = resolve_status(subject.status(record), subject.mark(record), subject.max_mark());
    *subject.status_mut(record) = Some(status);
}

/// Finalizes the Java, Python and Machine Learning statuses of `record`.
pub fn derive_statuses(record: &mut StudentRecord) {
    for subject in Subject::ALL {
        derive_subject(record, subject);
    }
}

/// The combined class view's historical derivation.
///
/// It stored the derived Machine Learning status under a column nothing
/// reads, so the ML status it reports is whatever the source supplied,
/// possibly none. Java and Python are derived as in [`derive_statuses`].
pub fn derive_statuses_combined_view_legacy(record: &mut StudentRecord) {
    derive_subject(record, Subject::Java);
    derive_subject(record, Subject::Python);
}

pub fn derive_all(records: &mut [StudentRecord]) {
    records.iter_mut().for_each(derive_statuses);
}

/// Infers one subject's mark from the total and the other two subjects:
/// `max(total - (a + b), 0)`. Non-numeric components read as 0.
pub fn infer_subject_mark(record: &StudentRecord, target: Subject) -> f64 {
    let total = record.total_mark.number_or_zero();
    let others: f64 = Subject::ALL
        .into_iter()
        .filter(|subject| *subject != target)
        .map(|subject| subject.mark(record).number_or_zero())
        .sum();

    (total - others).max(0.0)
}

/// Java = Total - Python - ML, clipped at 0. This is the formula every
/// breakdown view uses.
pub fn infer_java_mark(record: &StudentRecord) -> f64 {
    infer_subject_mark(record, Subject::Java)
}
