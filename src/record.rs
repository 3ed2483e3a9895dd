//! Data model shared by every pipeline stage.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder rendered wherever a field is absent.
pub const SENTINEL: &str = "-";

/// A single cell as it travels through the pipeline.
///
/// `Missing` is the explicit form of the `"-"` placeholder; it never takes
/// part in arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Interprets one raw CSV cell. Empty cells are absent, finite numerics
    /// become numbers, everything else stays text.
    pub fn from_cell(cell: &str) -> Option<Value> {
        if cell.is_empty() {
            return None;
        }
        match cell.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(Value::Number(n)),
            _ => Some(Value::Text(cell.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric content, or `0.0` for anything else.
    pub fn number_or_zero(&self) -> f64 {
        match self {
            Value::Number(n) if !n.is_nan() => *n,
            _ => 0.0,
        }
    }

    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Number(n) => Some(n.to_string()),
            Value::Text(s) => Some(s.clone()),
            Value::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Missing => f.write_str(SENTINEL),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Missing => serializer.serialize_str(SENTINEL),
        }
    }
}

/// One parsed data row keyed by the raw header text, in column order.
pub type RawRow = Vec<(String, Value)>;

/// A row after key normalization, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub fields: BTreeMap<String, Value>,
    pub class_label: String,
    pub sequence_number: usize,
}

impl NormalizedRow {
    /// The value under `key`, treating the placeholder as absent.
    pub fn present(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_missing())
    }
}

/// Good / Average / Poor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StatusLevel {
    Good,
    Average,
    Poor,
}

impl StatusLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLevel::Good => "Good",
            StatusLevel::Average => "Average",
            StatusLevel::Poor => "Poor",
        }
    }

    /// Case-insensitive reading of a status label. Anything that is not
    /// good or average counts as poor.
    pub fn classify(label: &str) -> StatusLevel {
        match label.trim().to_lowercase().as_str() {
            "good" => StatusLevel::Good,
            "average" => StatusLevel::Average,
            _ => StatusLevel::Poor,
        }
    }

    /// Case-insensitive equality against this level.
    pub fn matches(self, label: &str) -> bool {
        label.trim().eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three tracked subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Subject {
    Java,
    Python,
    MachineLearning,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Java, Subject::Python, Subject::MachineLearning];

    pub fn name(self) -> &'static str {
        match self {
            Subject::Java => "Java",
            Subject::Python => "Python",
            Subject::MachineLearning => "Machine Learning",
        }
    }

    pub fn max_mark(self) -> f64 {
        match self {
            Subject::Java => 35.0,
            Subject::Python => 35.0,
            Subject::MachineLearning => 30.0,
        }
    }

    pub fn mark(self, record: &StudentRecord) -> &Value {
        match self {
            Subject::Java => &record.java_mark,
            Subject::Python => &record.python_mark,
            Subject::MachineLearning => &record.ml_mark,
        }
    }

    pub fn status(self, record: &StudentRecord) -> Option<&str> {
        match self {
            Subject::Java => record.java_status.as_deref(),
            Subject::Python => record.python_status.as_deref(),
            Subject::MachineLearning => record.ml_status.as_deref(),
        }
    }

    pub(crate) fn status_mut(self, record: &mut StudentRecord) -> &mut Option<String> {
        match self {
            Subject::Java => &mut record.java_status,
            Subject::Python => &mut record.python_status,
            Subject::MachineLearning => &mut record.ml_status,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subject {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "java" => Ok(Subject::Java),
            "python" => Ok(Subject::Python),
            "ml" | "machine learning" | "machine-learning" => Ok(Subject::MachineLearning),
            other => Err(format!("unknown subject '{other}' (expected java, python or ml)")),
        }
    }
}

fn or_sentinel<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(SENTINEL))
}

/// The canonical student row every consumer reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentRecord {
    #[serde(rename = "SNO")]
    pub sequence_number: usize,
    #[serde(rename = "USN", serialize_with = "or_sentinel")]
    pub usn: Option<String>,
    #[serde(rename = "First Name", serialize_with = "or_sentinel")]
    pub first_name: Option<String>,
    #[serde(rename = "Java-35m")]
    pub java_mark: Value,
    #[serde(rename = "Python-35m")]
    pub python_mark: Value,
    #[serde(rename = "Machine Learning-30m")]
    pub ml_mark: Value,
    #[serde(rename = "Total")]
    pub total_mark: Value,
    #[serde(rename = "Status", serialize_with = "or_sentinel")]
    pub overall_status: Option<String>,
    #[serde(rename = "Java Status", serialize_with = "or_sentinel")]
    pub java_status: Option<String>,
    #[serde(rename = "Python Status", serialize_with = "or_sentinel")]
    pub python_status: Option<String>,
    #[serde(rename = "ML Status", serialize_with = "or_sentinel")]
    pub ml_status: Option<String>,
    #[serde(rename = "ClassName")]
    pub class_name: String,
}

/// The merged, derived record set of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MergedDataset {
    records: Vec<StudentRecord>,
}

impl MergedDataset {
    pub fn new(records: Vec<StudentRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[StudentRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [StudentRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record carrying `usn`. Duplicate USNs are kept as separate
    /// records; lookups see the earliest.
    pub fn find_by_usn(&self, usn: &str) -> Option<&StudentRecord> {
        self.records.iter().find(|r| r.usn.as_deref() == Some(usn))
    }
}
