//! Aggregation over validation results: summary counts, filters, and
//! document / portfolio roll-ups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseStatusError;
use crate::validation::{ValidationResult, ValidationStatus};

/// Summary statistics for a set of validation results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub validated: usize,
    pub warning: usize,
    pub error: usize,
    /// Percentage of validated fields, rounded. 0 for an empty set.
    pub completion_rate: u8,
}

/// Reduce results to summary counts.
pub fn summarize<'a, I>(results: I) -> ValidationSummary
where
    I: IntoIterator<Item = &'a ValidationResult>,
{
    let mut s = ValidationSummary::default();
    for r in results {
        s.total += 1;
        match r.status {
            ValidationStatus::Validated => s.validated += 1,
            ValidationStatus::Warning => s.warning += 1,
            ValidationStatus::Error => s.error += 1,
        }
    }
    s.completion_rate = percent(s.validated, s.total);
    s
}

fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u8
}

// ── Filters ──

/// Status filter as offered by the dashboard: everything, or one status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ValidationStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: ValidationStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => *s == status,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(s) => f.write_str(s.as_str()),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

/// Keep results with the given status, in their original order.
pub fn filter_by_status<'a, I>(results: I, filter: StatusFilter) -> Vec<&'a ValidationResult>
where
    I: IntoIterator<Item = &'a ValidationResult>,
{
    results
        .into_iter()
        .filter(|r| filter.matches(r.status))
        .collect()
}

/// Keep results whose display term contains `needle`, ignoring case.
/// An empty needle keeps everything.
pub fn filter_by_search<'a, I>(results: I, needle: &str) -> Vec<&'a ValidationResult>
where
    I: IntoIterator<Item = &'a ValidationResult>,
{
    let needle = needle.trim().to_lowercase();
    results
        .into_iter()
        .filter(|r| needle.is_empty() || r.term.to_lowercase().contains(&needle))
        .collect()
}

/// Status and search filters combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultQuery {
    pub status: StatusFilter,
    pub search: Option<String>,
}

impl ResultQuery {
    pub fn apply<'a>(&self, results: &'a [ValidationResult]) -> Vec<&'a ValidationResult> {
        let by_status = filter_by_status(results, self.status);
        match self.search.as_deref() {
            Some(needle) => filter_by_search(by_status, needle),
            None => by_status,
        }
    }
}

// ── Roll-ups ──

/// Document-level status derived from its field results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Every field validated (or there were no fields).
    Validated,
    /// No errors, at least one warning.
    Flagged,
    /// At least one field in error.
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Flagged => "flagged",
            Self::Failed => "failed",
        }
    }

    pub fn from_summary(summary: &ValidationSummary) -> Self {
        if summary.error > 0 {
            Self::Failed
        } else if summary.warning > 0 {
            Self::Flagged
        } else {
            Self::Validated
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validated" => Ok(Self::Validated),
            "flagged" => Ok(Self::Flagged),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Statistics across many documents, e.g. everything one trader submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_documents: usize,
    pub fully_validated: usize,
    pub flagged: usize,
    pub failed: usize,
    /// Percentage of fully validated documents, two decimals. 0 when empty.
    pub validation_rate: f64,
    /// Fields not in `validated` status, summed over all documents.
    pub unvalidated_fields: usize,
}

impl PortfolioSummary {
    pub fn from_documents<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a [ValidationResult]>,
    {
        let mut p = Self::default();
        for results in documents {
            let s = summarize(results);
            p.total_documents += 1;
            p.unvalidated_fields += s.total - s.validated;
            match DocumentStatus::from_summary(&s) {
                DocumentStatus::Validated => p.fully_validated += 1,
                DocumentStatus::Flagged => p.flagged += 1,
                DocumentStatus::Failed => p.failed += 1,
            }
        }
        if p.total_documents > 0 {
            let rate = p.fully_validated as f64 * 100.0 / p.total_documents as f64;
            p.validation_rate = (rate * 100.0).round() / 100.0;
        }
        p
    }
}
