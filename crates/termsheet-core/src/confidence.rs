//! Confidence scoring between an extracted value and its reference.
//!
//! Scores are integers in `0..=100`:
//!
//! - either side null → 0
//! - both numeric → relative error, `round((1 - |a - b| / max(|a|, |b|, floor)) * 100)`
//! - otherwise → 100 on normalised text equality, else 0
//!
//! The numeric branch is relative rather than absolute, so a $1 slip on a
//! $20,000,000 notional still scores 100 while a 1.0 vs 2.0 rate scores 50.

use crate::normalize::normalize_text;
use crate::policy::ValidationPolicy;
use crate::value::FieldValue;

/// Score an extracted value against its expected counterpart.
pub fn score(extracted: &FieldValue, expected: &FieldValue, policy: &ValidationPolicy) -> u8 {
    match (extracted, expected) {
        (FieldValue::Null, _) | (_, FieldValue::Null) => 0,
        (FieldValue::Numeric(a), FieldValue::Numeric(b)) => {
            relative_confidence(*a, *b, policy.numeric_floor)
        }
        (a, b) => exact_confidence(&a.display_text(), &b.display_text()),
    }
}

/// Relative-error confidence for two numbers.
///
/// Non-finite inputs score 0. The result is clamped to `0..=100`; opposite
/// signs of similar magnitude would otherwise go negative.
pub fn relative_confidence(a: f64, b: f64, floor: f64) -> u8 {
    if !(a.is_finite() && b.is_finite()) {
        return 0;
    }
    let denom = a.abs().max(b.abs()).max(floor);
    let ratio = 1.0 - (a - b).abs() / denom;
    let pct = (ratio * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}

/// All-or-nothing confidence for textual values.
pub fn exact_confidence(a: &str, b: &str) -> u8 {
    if normalize_text(a) == normalize_text(b) {
        100
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p() -> ValidationPolicy {
        ValidationPolicy::default()
    }

    fn num(n: f64) -> FieldValue {
        FieldValue::Numeric(n)
    }

    fn txt(s: &str) -> FieldValue {
        FieldValue::text(s)
    }

    #[test]
    fn identical_numbers_score_100() {
        assert_eq!(score(&num(20_000_000.0), &num(20_000_000.0), &p()), 100);
        assert_eq!(score(&num(-3.5), &num(-3.5), &p()), 100);
    }

    #[test]
    fn both_zero_is_exact_match() {
        assert_eq!(score(&num(0.0), &num(0.0), &p()), 100);
    }

    #[test]
    fn notional_mismatch_is_relative() {
        // 1 - 500_000 / 20_500_000 = 0.9756 → 98
        assert_eq!(score(&num(20_000_000.0), &num(20_500_000.0), &p()), 98);
    }

    #[test]
    fn one_dollar_on_large_notional_rounds_to_100() {
        assert_eq!(score(&num(20_000_000.0), &num(20_000_001.0), &p()), 100);
    }

    #[test]
    fn floor_applies_near_zero() {
        // max(|0.2|, |0|, 1) = 1 → 1 - 0.2 = 0.8 → 80
        assert_eq!(relative_confidence(0.2, 0.0, 1.0), 80);
        // Without the floor dominating: 1 - 0.2/0.2 = 0
        assert_eq!(relative_confidence(0.2, 0.0, 0.01), 0);
    }

    #[test]
    fn opposite_signs_clamp_to_zero() {
        assert_eq!(relative_confidence(100.0, -100.0, 1.0), 0);
    }

    #[test]
    fn half_rounds_away_from_zero() {
        // 1 - 7/8 = 0.125 → 12.5 → 13
        assert_eq!(relative_confidence(8.0, 1.0, 1.0), 13);
        // 1 - 0.5/1 = 0.5 → 50
        assert_eq!(relative_confidence(1.0, 0.5, 1.0), 50);
    }

    #[test]
    fn non_finite_scores_zero() {
        assert_eq!(relative_confidence(f64::NAN, 1.0, 1.0), 0);
        assert_eq!(relative_confidence(f64::INFINITY, f64::INFINITY, 1.0), 0);
    }

    #[test]
    fn null_on_either_side_scores_zero() {
        assert_eq!(score(&FieldValue::Null, &txt("x"), &p()), 0);
        assert_eq!(score(&txt("x"), &FieldValue::Null, &p()), 0);
        assert_eq!(score(&FieldValue::Null, &FieldValue::Null, &p()), 0);
    }

    #[test]
    fn text_equality_is_trimmed_and_case_folded() {
        assert_eq!(score(&txt("3.25%"), &txt("3.25%"), &p()), 100);
        assert_eq!(score(&txt(" sofr "), &txt("SOFR"), &p()), 100);
        assert_eq!(score(&txt("Quarterly"), &txt("Monthly"), &p()), 0);
    }

    #[test]
    fn text_has_no_partial_credit() {
        assert_eq!(score(&txt("2025-05-01"), &txt("2025-05-02"), &p()), 0);
    }

    #[test]
    fn mixed_kinds_compare_as_text() {
        assert_eq!(score(&num(3.25), &txt("3.25"), &p()), 100);
        assert_eq!(score(&num(3.25), &txt("3.25%"), &p()), 0);
    }
}
