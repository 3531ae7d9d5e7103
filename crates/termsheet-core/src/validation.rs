//! Field validation: pairs an extracted record with its reference record and
//! turns every extracted field into a scored, classified [`ValidationResult`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::confidence;
use crate::error::ParseStatusError;
use crate::normalize::{display_term, lookup_key};
use crate::policy::ValidationPolicy;
use crate::value::{FieldRecord, FieldValue};

/// Outcome of comparing one extracted field against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Confidence reached the validated threshold.
    Validated,
    /// Close but not exact; needs a human glance.
    Warning,
    /// Mismatch, missing value, or no reference field.
    Error,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 3] = [Self::Validated, Self::Warning, Self::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "validated",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Classify a confidence score. Depends on nothing but the score and thresholds.
    pub fn from_confidence(confidence: u8, policy: &ValidationPolicy) -> Self {
        if confidence >= policy.validated_threshold {
            Self::Validated
        } else if confidence >= policy.warning_threshold {
            Self::Warning
        } else {
            Self::Error
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "validated" => Ok(Self::Validated),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Validation outcome for a single extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Display name, e.g. `"Notional Amount"`.
    pub term: String,
    /// Key as it appeared in the extracted record.
    pub field: String,
    /// Matching key in the reference record, if one was found.
    pub reference_key: Option<String>,
    pub extracted_value: FieldValue,
    pub expected_value: FieldValue,
    /// 0..=100
    pub confidence: u8,
    pub status: ValidationStatus,
}

/// Validate every non-structural field of `extracted` against `expected`.
///
/// Output follows `extracted`'s key order. Fields present only in `expected`
/// are not reported.
pub fn validate(
    extracted: &FieldRecord,
    expected: &FieldRecord,
    policy: &ValidationPolicy,
) -> Vec<ValidationResult> {
    let index = ReferenceIndex::new(expected);

    let results: Vec<ValidationResult> = extracted
        .iter()
        .filter(|(field, _)| !policy.is_excluded(field))
        .map(|(field, value)| validate_field(field, value, &index, policy))
        .collect();

    debug!(
        fields = results.len(),
        reference_fields = expected.len(),
        unmatched = results.iter().filter(|r| r.reference_key.is_none()).count(),
        "validated record pair"
    );
    results
}

fn validate_field(
    field: &str,
    value: &FieldValue,
    index: &ReferenceIndex<'_>,
    policy: &ValidationPolicy,
) -> ValidationResult {
    let term = display_term(field);
    match index.find(field) {
        Some((reference_key, expected)) => {
            let confidence = confidence::score(value, expected, policy);
            ValidationResult {
                term,
                field: field.to_string(),
                reference_key: Some(reference_key.to_string()),
                extracted_value: value.clone(),
                expected_value: expected.clone(),
                confidence,
                status: ValidationStatus::from_confidence(confidence, policy),
            }
        }
        None => ValidationResult {
            term,
            field: field.to_string(),
            reference_key: None,
            extracted_value: value.clone(),
            expected_value: FieldValue::Text(policy.not_available.clone()),
            confidence: 0,
            status: ValidationStatus::Error,
        },
    }
}

/// Lookup from normalised key to the first reference field carrying it.
struct ReferenceIndex<'a> {
    by_key: HashMap<String, (&'a str, &'a FieldValue)>,
}

impl<'a> ReferenceIndex<'a> {
    fn new(record: &'a FieldRecord) -> Self {
        let mut by_key = HashMap::with_capacity(record.len());
        for (name, value) in record.iter() {
            by_key.entry(lookup_key(name)).or_insert((name, value));
        }
        Self { by_key }
    }

    fn find(&self, field: &str) -> Option<(&'a str, &'a FieldValue)> {
        self.by_key.get(&lookup_key(field)).copied()
    }
}

// ── Batch validation ──

/// One term sheet and its risk-system reference, as served by the intake API.
///
/// Either record may be missing or `null`; such pairs are skipped by
/// [`validate_batch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermsheetPair {
    #[serde(rename = "tradeId", default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(default)]
    pub termsheet: Option<FieldRecord>,
    #[serde(default)]
    pub reference_swap: Option<FieldRecord>,
}

impl TermsheetPair {
    /// Trade identifier: the explicit `tradeId`, else one found in the term sheet.
    pub fn resolve_trade_id(&self) -> Option<String> {
        if let Some(id) = &self.trade_id
            && !id.trim().is_empty()
        {
            return Some(id.clone());
        }
        let key = lookup_key("tradeId");
        self.termsheet.as_ref().and_then(|ts| {
            ts.iter()
                .find(|(k, v)| lookup_key(k) == key && !v.is_null())
                .map(|(_, v)| v.display_text())
        })
    }
}

/// Validation results for one trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeValidation {
    pub trade_id: String,
    pub results: Vec<ValidationResult>,
}

/// Validate every complete pair. Incomplete pairs are dropped with a debug log.
pub fn validate_batch(pairs: &[TermsheetPair], policy: &ValidationPolicy) -> Vec<TradeValidation> {
    let mut out = Vec::with_capacity(pairs.len());
    for (i, pair) in pairs.iter().enumerate() {
        let (Some(termsheet), Some(reference)) = (&pair.termsheet, &pair.reference_swap) else {
            debug!(index = i, trade_id = ?pair.trade_id, "skipping incomplete term sheet pair");
            continue;
        };
        let trade_id = pair
            .resolve_trade_id()
            .unwrap_or_else(|| format!("pair-{i}"));
        out.push(TradeValidation {
            trade_id,
            results: validate(termsheet, reference, policy),
        });
    }
    out
}
