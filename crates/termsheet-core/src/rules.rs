//! Consistency rules over a single term sheet record.
//!
//! Field validation compares a record with its reference; these rules check
//! that a record agrees with itself: notionals against the FX spot, leg rate
//! types against the rates given, amortisation schedules against the
//! notional. Each finding is an [`Anomaly`] graded `high` or `medium`.
//!
//! Field names are matched with [`lookup_key`], so `base_notional_amount`,
//! `BaseNotionalAmount` and `Base Notional Amount` are the same field.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ParseStatusError;
use crate::normalize::lookup_key;
use crate::policy::ValidationPolicy;
use crate::value::{FieldRecord, FieldValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation found in a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub field: String,
    pub issue: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
}

impl Anomaly {
    fn new(severity: Severity, field: &str, issue: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            issue: issue.into(),
            severity,
            current_value: None,
            expected_value: None,
        }
    }

    fn high(field: &str, issue: impl Into<String>) -> Self {
        Self::new(Severity::High, field, issue)
    }

    fn medium(field: &str, issue: impl Into<String>) -> Self {
        Self::new(Severity::Medium, field, issue)
    }

    fn current(mut self, value: impl Into<String>) -> Self {
        self.current_value = Some(value.into());
        self
    }

    fn expected(mut self, value: impl Into<String>) -> Self {
        self.expected_value = Some(value.into());
        self
    }
}

/// Which rule set applies to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwapKind {
    CrossCurrency,
    Amortising,
}

impl SwapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrossCurrency => "cross-currency",
            Self::Amortising => "amortising",
        }
    }

    /// Guess the kind from the fields a record carries.
    pub fn detect(record: &FieldRecord) -> Option<Self> {
        let has = |name: &str| lookup(record, name).is_some();
        if has("quote_currency") || has("fx_spot_rate") || has("base_notional_amount") {
            Some(Self::CrossCurrency)
        } else if has("amortization_profile") || has("initial_notional") {
            Some(Self::Amortising)
        } else {
            None
        }
    }
}

impl fmt::Display for SwapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapKind {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cross-currency" | "cross_currency" | "currency" => Ok(Self::CrossCurrency),
            "amortising" | "amortizing" | "amortised" | "amortized" => Ok(Self::Amortising),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// Run every rule for `kind` against `record`.
pub fn check(record: &FieldRecord, kind: SwapKind, policy: &ValidationPolicy) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    match kind {
        SwapKind::CrossCurrency => {
            anomalies.extend(check_currency_notionals(record, policy.fx_tolerance));
            anomalies.extend(check_leg_rate_types(record));
            anomalies.extend(check_principal_exchange(record));
        }
        SwapKind::Amortising => {
            anomalies.extend(check_amortization_schedule(record));
            anomalies.extend(check_rate_specification(record));
        }
    }
    debug!(
        kind = kind.as_str(),
        anomalies = anomalies.len(),
        high = anomalies.iter().filter(|a| a.severity == Severity::High).count(),
        "checked record rules"
    );
    anomalies
}

// ── Cross-currency ──

/// Quote notional must equal base notional times FX spot, within a relative `tolerance`.
pub fn check_currency_notionals(record: &FieldRecord, tolerance: f64) -> Vec<Anomaly> {
    const FIELD: &str = "notional_amounts";

    let mut values = [0.0f64; 3];
    for (slot, name) in values
        .iter_mut()
        .zip(["base_notional_amount", "quote_notional_amount", "fx_spot_rate"])
    {
        match lookup(record, name) {
            None | Some(FieldValue::Null) => {}
            Some(v) => match number(v) {
                Some(n) => *slot = n,
                None => {
                    return vec![
                        Anomaly::high(FIELD, format!("{name} is not a number"))
                            .current(v.display_text()),
                    ];
                }
            },
        }
    }
    let [base, quote, fx] = values;

    if base <= 0.0 || quote <= 0.0 || fx <= 0.0 {
        return vec![Anomaly::high(
            FIELD,
            "Invalid notional amounts or FX rate (must be positive)",
        )];
    }

    let implied = base * fx;
    if (implied - quote).abs() / quote > tolerance {
        return vec![
            Anomaly::high(FIELD, "Notional amounts inconsistent with FX spot rate")
                .current(format!(
                    "Base: {}, Quote: {}, FX: {}",
                    show(base),
                    show(quote),
                    show(fx)
                ))
                .expected(format!("Expected quote notional: {}", show(implied))),
        ];
    }
    Vec::new()
}

/// A fixed leg needs a fixed rate; a floating leg needs a floating index.
pub fn check_leg_rate_types(record: &FieldRecord) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    for (leg, title) in [("base", "Base"), ("quote", "Quote")] {
        let type_field = format!("{leg}_leg_rate_type");
        let rate_type = lowered(record, &type_field);
        match rate_type.as_str() {
            "" => {}
            "fixed" => {
                let field = format!("{leg}_leg_fixed_rate");
                if is_blank(lookup(record, &field)) {
                    anomalies.push(Anomaly::high(
                        &field,
                        format!("{title} leg is fixed but no fixed rate specified"),
                    ));
                }
            }
            "floating" => {
                let field = format!("{leg}_leg_floating_index");
                if is_blank(lookup(record, &field)) {
                    anomalies.push(Anomaly::high(
                        &field,
                        format!("{title} leg is floating but no floating index specified"),
                    ));
                }
            }
            other => anomalies.push(
                Anomaly::high(
                    &type_field,
                    format!("Invalid {leg} leg rate type (should be 'fixed' or 'floating')"),
                )
                .current(other),
            ),
        }
    }
    anomalies
}

/// An amortising currency swap should exchange principal at both ends.
pub fn check_principal_exchange(record: &FieldRecord) -> Vec<Anomaly> {
    let schedule = lowered(record, "amortization_schedule");
    if matches!(schedule.as_str(), "" | "none" | "bullet") {
        return Vec::new();
    }

    let mut anomalies = Vec::new();
    for (field, end) in [
        ("principal_exchange_initial", "initial"),
        ("principal_exchange_final", "final"),
    ] {
        if lowered(record, field) != "true" {
            anomalies.push(
                Anomaly::medium(field, format!("Amortizing swap should have {end} principal exchange"))
                    .current(raw(record, field)),
            );
        }
    }
    anomalies
}

// ── Amortising ──

/// Notional bounds, and for custom profiles a well-formed reduction schedule.
pub fn check_amortization_schedule(record: &FieldRecord) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let initial = match lookup(record, "initial_notional") {
        None | Some(FieldValue::Null) => Some(0.0),
        Some(v) => number(v),
    };
    let initial = match initial {
        Some(n) if n > 0.0 => n,
        Some(n) => {
            anomalies.push(
                Anomaly::high("initial_notional", "Initial notional must be positive").current(show(n)),
            );
            n
        }
        None => {
            anomalies.push(
                Anomaly::high("initial_notional", "Invalid initial notional format")
                    .current(raw(record, "initial_notional")),
            );
            0.0
        }
    };

    if let Some(v) = lookup(record, "residual_notional") {
        match number(v) {
            Some(r) if r < 0.0 => anomalies.push(
                Anomaly::high("residual_notional", "Residual notional cannot be negative").current(show(r)),
            ),
            Some(r) if r > initial => anomalies.push(
                Anomaly::high("residual_notional", "Residual notional exceeds initial notional")
                    .current(show(r))
                    .expected(show(initial)),
            ),
            Some(_) => {}
            None => anomalies.push(
                Anomaly::high("residual_notional", "Invalid residual notional format")
                    .current(v.display_text()),
            ),
        }
    }

    match lowered(record, "amortization_profile").as_str() {
        "custom" | "custom schedule" => {
            anomalies.extend(check_reduction_schedule(record, initial));
        }
        "linear" => {
            if is_blank(lookup(record, "payment_frequency")) {
                anomalies.push(Anomaly::medium(
                    "payment_frequency",
                    "Payment frequency required for linear amortization",
                ));
            }
        }
        _ => {}
    }
    anomalies
}

fn check_reduction_schedule(record: &FieldRecord, initial: f64) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let dates = list_field(record, "reduction_dates", &mut anomalies);
    let amounts = list_field(record, "reduction_amounts", &mut anomalies);

    if dates.len() != amounts.len() {
        anomalies.push(
            Anomaly::high(
                "amortization_schedule",
                "Reduction dates and amounts must have the same length",
            )
            .current(format!("Dates: {}, Amounts: {}", dates.len(), amounts.len())),
        );
    }

    if dates.len() > 1 {
        let parsed: Option<Vec<NaiveDate>> = dates
            .iter()
            .map(|d| d.as_str().and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
            .collect();
        match parsed {
            Some(parsed) if parsed.windows(2).all(|w| w[0] < w[1]) => {}
            Some(_) => anomalies.push(
                Anomaly::high("reduction_dates", "Reduction dates must be in chronological order")
                    .current(compact(&dates)),
            ),
            None => anomalies.push(
                Anomaly::high("reduction_dates", "Invalid date format in reduction dates")
                    .current(compact(&dates)),
            ),
        }
    }

    let parsed: Option<Vec<f64>> = amounts.iter().map(json_number).collect();
    match parsed {
        None => anomalies.push(
            Anomaly::high("reduction_amounts", "Invalid amount format in reduction amounts")
                .current(compact(&amounts)),
        ),
        Some(parsed) => {
            if parsed.iter().any(|a| *a <= 0.0) {
                anomalies.push(
                    Anomaly::high("reduction_amounts", "All reduction amounts must be positive")
                        .current(compact(&amounts)),
                );
            }
            let total: f64 = parsed.iter().sum();
            if initial > 0.0 && total > initial {
                anomalies.push(
                    Anomaly::high(
                        "amortization_schedule",
                        "Total reduction amount exceeds initial notional",
                    )
                    .current(format!(
                        "Total reduction: {}, Initial notional: {}",
                        show(total),
                        show(initial)
                    )),
                );
            }
        }
    }
    anomalies
}

/// Fixed swaps need a non-negative fixed rate; floating swaps a reference
/// rate and reset frequency.
pub fn check_rate_specification(record: &FieldRecord) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    match lowered(record, "rate_type").as_str() {
        "fixed" => match lookup(record, "fixed_rate") {
            v if is_blank(v) => anomalies.push(Anomaly::high(
                "fixed_rate",
                "Fixed rate is required for fixed rate swaps",
            )),
            Some(v) => match number(v) {
                Some(rate) if rate < 0.0 => anomalies.push(
                    Anomaly::medium("fixed_rate", "Fixed rate cannot be negative")
                        .current(v.display_text()),
                ),
                Some(_) => {}
                None => anomalies.push(
                    Anomaly::high("fixed_rate", "Invalid fixed rate format").current(v.display_text()),
                ),
            },
            None => {}
        },
        "floating" => {
            if is_blank(lookup(record, "reference_rate")) {
                anomalies.push(Anomaly::high(
                    "reference_rate",
                    "Reference rate is required for floating rate swaps",
                ));
            }
            if is_blank(lookup(record, "reset_frequency")) {
                anomalies.push(Anomaly::medium(
                    "reset_frequency",
                    "Reset frequency is required for floating rate swaps",
                ));
            }
            if let Some(spread) = lookup(record, "spread")
                && !is_blank(Some(spread))
                && number(spread).is_none()
            {
                anomalies.push(
                    Anomaly::medium("spread", "Invalid spread format").current(spread.display_text()),
                );
            }
        }
        "" => anomalies.push(Anomaly::high("rate_type", "Rate type is required")),
        other => anomalies.push(
            Anomaly::high("rate_type", "Invalid rate type (should be 'fixed' or 'floating')")
                .current(other),
        ),
    }
    anomalies
}

// ── Helpers ──

fn lookup<'a>(record: &'a FieldRecord, name: &str) -> Option<&'a FieldValue> {
    let key = lookup_key(name);
    record
        .iter()
        .find(|(k, _)| lookup_key(k) == key)
        .map(|(_, v)| v)
}

/// Absent, null, or whitespace-only text. Numbers (including zero) count as given.
fn is_blank(value: Option<&FieldValue>) -> bool {
    match value {
        None | Some(FieldValue::Null) => true,
        Some(FieldValue::Text(s)) => s.trim().is_empty(),
        Some(FieldValue::Numeric(_)) => false,
    }
}

fn lowered(record: &FieldRecord, name: &str) -> String {
    lookup(record, name)
        .map(|v| v.display_text().trim().to_lowercase())
        .unwrap_or_default()
}

fn raw(record: &FieldRecord, name: &str) -> String {
    lookup(record, name).map(FieldValue::display_text).unwrap_or_default()
}

/// Numeric reading of a value. Text may carry thousands separators or a
/// trailing `%`.
fn number(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Numeric(n) => Some(*n).filter(|n| n.is_finite()),
        FieldValue::Text(s) => parse_number(s),
        FieldValue::Null => None,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let cleaned: String = s.trim().trim_end_matches('%').chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Read a list-valued field. Nested JSON arrays arrive as compact JSON text.
/// Absent or null reads as an empty list; anything else is reported.
fn list_field(record: &FieldRecord, name: &str, anomalies: &mut Vec<Anomaly>) -> Vec<Value> {
    let text = match lookup(record, name) {
        None | Some(FieldValue::Null) => return Vec::new(),
        Some(FieldValue::Numeric(n)) => {
            anomalies.push(Anomaly::high(name, format!("{} must be a list", title(name))).current(show(*n)));
            return Vec::new();
        }
        Some(FieldValue::Text(s)) => s,
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            anomalies.push(Anomaly::high(name, format!("{} must be a list", title(name))).current(text.as_str()));
            Vec::new()
        }
        Err(_) => {
            anomalies.push(
                Anomaly::high(name, format!("Invalid JSON format for {}", name.replace('_', " ")))
                    .current(text.as_str()),
            );
            Vec::new()
        }
    }
}

fn title(name: &str) -> String {
    crate::normalize::display_term(name)
}

fn compact(values: &[Value]) -> String {
    Value::Array(values.to_vec()).to_string()
}

/// Display a computed amount, rounded to six places so float noise in
/// products like `base * fx` does not reach the output.
fn show(n: f64) -> String {
    FieldValue::Numeric((n * 1e6).round() / 1e6).display_text()
}
