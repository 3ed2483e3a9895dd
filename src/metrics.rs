//! Population metrics and leaderboard views over a snapshot.
//!
//! Everything here is computed on demand from a record slice; nothing is
//! cached between calls.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::record::{StatusLevel, StudentRecord, Subject};
use crate::status::infer_java_mark;

/// How overall status labels are compared when counting a population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMatching {
    /// `"Good"` and `"Average"` must match exactly while Poor is counted
    /// against lowercase `"poor"`. This reproduces the counts the existing
    /// dashboards show.
    #[default]
    Legacy,
    /// Trimmed, case-insensitive comparison for all three levels.
    CaseInsensitive,
}

/// Population counts by overall status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverallMetrics {
    pub total_students: usize,
    pub total_good: usize,
    pub total_average: usize,
    pub total_poor: usize,
}

impl OverallMetrics {
    pub fn compute<'a, I>(records: I, matching: StatusMatching) -> Self
    where
        I: IntoIterator<Item = &'a StudentRecord>,
    {
        let is_level: fn(&str, StatusLevel) -> bool = match matching {
            StatusMatching::Legacy => |label, level| match level {
                StatusLevel::Good => label == "Good",
                StatusLevel::Average => label == "Average",
                StatusLevel::Poor => label == "poor",
            },
            StatusMatching::CaseInsensitive => |label, level| level.matches(label),
        };

        let mut metrics = OverallMetrics::default();
        for record in records {
            metrics.total_students += 1;
            let Some(label) = record.overall_status.as_deref() else {
                continue;
            };
            if is_level(label, StatusLevel::Good) {
                metrics.total_good += 1;
            } else if is_level(label, StatusLevel::Average) {
                metrics.total_average += 1;
            } else if is_level(label, StatusLevel::Poor) {
                metrics.total_poor += 1;
            }
        }
        metrics
    }

    pub fn legacy<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a StudentRecord>,
    {
        Self::compute(records, StatusMatching::Legacy)
    }

    pub fn case_insensitive<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a StudentRecord>,
    {
        Self::compute(records, StatusMatching::CaseInsensitive)
    }
}

/// Good / Average / Poor counts for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubjectDistribution {
    pub subject: Subject,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
}

/// Per-subject status counts. Any subject status that is neither good nor
/// average (case-insensitive), including a missing one, counts as poor.
pub fn subject_distribution<'a, I>(records: I) -> Vec<SubjectDistribution>
where
    I: IntoIterator<Item = &'a StudentRecord>,
{
    let mut dist: Vec<SubjectDistribution> = Subject::ALL
        .into_iter()
        .map(|subject| SubjectDistribution {
            subject,
            good: 0,
            average: 0,
            poor: 0,
        })
        .collect();

    for record in records {
        for entry in dist.iter_mut() {
            match StatusLevel::classify(entry.subject.status(record).unwrap_or("")) {
                StatusLevel::Good => entry.good += 1,
                StatusLevel::Average => entry.average += 1,
                StatusLevel::Poor => entry.poor += 1,
            }
        }
    }
    dist
}

/// Which slice of a snapshot a view covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    All,
    /// Records whose USN equals the given one.
    Student(&'a str),
    /// Records carrying either a mark or a status for the subject.
    Subject(Subject),
}

pub fn select<'a>(records: &'a [StudentRecord], scope: Scope<'_>) -> Vec<&'a StudentRecord> {
    records
        .iter()
        .filter(|record| match scope {
            Scope::All => true,
            Scope::Student(usn) => record.usn.as_deref() == Some(usn),
            Scope::Subject(subject) => {
                !subject.mark(record).is_missing() || subject.status(record).is_some()
            }
        })
        .collect()
}

/// Descending by key; records without a usable key go last. Stable, so
/// ties keep their input order.
fn ranked_by<'a, I, F>(records: I, n: usize, key: F) -> Vec<&'a StudentRecord>
where
    I: IntoIterator<Item = &'a StudentRecord>,
    F: Fn(&StudentRecord) -> Option<f64>,
{
    let mut ranked: Vec<&StudentRecord> = records.into_iter().collect();
    ranked.sort_by(|a, b| {
        match (key(a).filter(|v| !v.is_nan()), key(b).filter(|v| !v.is_nan())) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    ranked.truncate(n);
    ranked
}

/// The `n` highest totals, ties in original sequence order.
pub fn top_n<'a, I>(records: I, n: usize) -> Vec<&'a StudentRecord>
where
    I: IntoIterator<Item = &'a StudentRecord>,
{
    ranked_by(records, n, |r| r.total_mark.as_number())
}

/// Status counts and leaders for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectOverview<'a> {
    pub subject: Subject,
    pub total: usize,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
    pub top: Vec<&'a StudentRecord>,
}

pub const SUBJECT_OVERVIEW_TOP: usize = 10;

/// Overview of the records in [`Scope::Subject`]. Counts compare the subject
/// status case-insensitively and a label matching none of the three levels
/// is counted in none of them. Leaders are ranked by the subject mark.
pub fn subject_overview(records: &[StudentRecord], subject: Subject) -> SubjectOverview<'_> {
    let scoped = select(records, Scope::Subject(subject));
    let count = |level: StatusLevel| {
        scoped
            .iter()
            .filter(|r| subject.status(r).is_some_and(|s| level.matches(s)))
            .count()
    };

    let top = ranked_by(
        scoped.iter().copied().filter(|r| subject.mark(r).as_number().is_some()),
        SUBJECT_OVERVIEW_TOP,
        |r| subject.mark(r).as_number(),
    );

    SubjectOverview {
        subject,
        total: scoped.len(),
        good: count(StatusLevel::Good),
        average: count(StatusLevel::Average),
        poor: count(StatusLevel::Poor),
        top,
    }
}

/// Per-subject marks for one student, with Java inferred from the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkBreakdown {
    pub name: String,
    pub usn: String,
    pub java: f64,
    pub python: f64,
    pub machine_learning: f64,
    pub total: f64,
}

pub const BREAKDOWN_TOP: usize = 20;

impl MarkBreakdown {
    pub fn from_record(record: &StudentRecord) -> Self {
        let name = record
            .first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unknown")
            .chars()
            .take(10)
            .collect();
        let usn = record
            .usn
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or("N/A")
            .to_string();

        MarkBreakdown {
            name,
            usn,
            java: infer_java_mark(record),
            python: record.python_mark.number_or_zero(),
            machine_learning: record.ml_mark.number_or_zero(),
            total: record.total_mark.number_or_zero(),
        }
    }
}

/// Breakdowns for the student with `usn`, or for the top
/// [`BREAKDOWN_TOP`] by total when no student is selected.
pub fn mark_breakdowns(records: &[StudentRecord], usn: Option<&str>) -> Vec<MarkBreakdown> {
    let chosen = match usn {
        Some(usn) => select(records, Scope::Student(usn)),
        None => top_n(records, BREAKDOWN_TOP),
    };
    chosen.into_iter().map(MarkBreakdown::from_record).collect()
}

/// A subject's mark as a percentage of its maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubjectShare {
    pub subject: Subject,
    pub percent: f64,
}

/// Percent of maximum per subject, one decimal place. Java is inferred
/// from the total.
pub fn subject_percentages(record: &StudentRecord) -> Vec<SubjectShare> {
    let marks = [
        (Subject::Java, infer_java_mark(record)),
        (Subject::Python, record.python_mark.number_or_zero()),
        (Subject::MachineLearning, record.ml_mark.number_or_zero()),
    ];

    marks
        .into_iter()
        .map(|(subject, mark)| SubjectShare {
            subject,
            percent: ((mark / subject.max_mark()) * 100.0 * 10.0).round() / 10.0,
        })
        .filter(|share| !share.percent.is_nan() && share.percent >= 0.0)
        .collect()
}

/// Feedback line shown next to a student's overall status. A missing
/// status reads as Poor.
pub fn performance_feedback(overall_status: Option<&str>) -> &'static str {
    match overall_status.unwrap_or("Poor").to_lowercase().as_str() {
        "good" => {
            "Excellent performance! Keep up the strong work and continue to deepen your understanding."
        }
        "average" => {
            "Good effort, but there's room for improvement. Focus on revising key concepts and practice regularly."
        }
        "poor" => {
            "More effort is needed. Consider seeking help, practicing consistently, and reviewing core topics."
        }
        _ => "No feedback available.",
    }
}
