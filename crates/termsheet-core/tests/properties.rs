//! Property tests for the scorer, validator and span segmenter.

use proptest::prelude::*;

use termsheet_core::confidence::score;
use termsheet_core::highlight::{HighlightSpan, TextSegment, segment};
use termsheet_core::summary::summarize;
use termsheet_core::validation::validate;
use termsheet_core::{FieldRecord, FieldValue, ValidationPolicy, ValidationStatus};

// ── Strategies ──

fn text_strategy() -> impl Strategy<Value = String> {
    // Mix of ASCII and multi-byte chars so char/byte offset confusion shows up.
    "[a-zA-Z0-9 €éß_.]{0,60}"
}

/// Spans mostly inside `0..=len`, with some out of range or inverted.
fn spans_strategy(len: usize) -> impl Strategy<Value = Vec<HighlightSpan>> {
    let bound = len as i64 + 3;
    prop::collection::vec(
        ("[A-Z]{1,4}", -2..bound, -2..bound)
            .prop_map(|(label, start, end)| HighlightSpan::new(label.clone(), label, start, end)),
        0..8,
    )
}

fn text_and_spans() -> impl Strategy<Value = (String, Vec<HighlightSpan>)> {
    text_strategy().prop_flat_map(|text| {
        let len = text.chars().count();
        (Just(text), spans_strategy(len))
    })
}

fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        (-1.0e9f64..1.0e9).prop_map(FieldValue::Numeric),
        "[ a-zA-Z0-9%.-]{0,12}".prop_map(FieldValue::Text),
        Just(FieldValue::Null),
    ]
}

fn record_strategy() -> impl Strategy<Value = FieldRecord> {
    prop::collection::vec(("[A-Za-z_]{1,10}", field_value_strategy()), 0..8)
        .prop_map(|entries| entries.into_iter().collect())
}

// ── Segmenter ──

proptest! {
    #[test]
    fn segments_concatenate_to_input((text, spans) in text_and_spans()) {
        let segs = segment(&text, &spans);
        let joined: String = segs.iter().map(TextSegment::text).collect();
        prop_assert_eq!(joined, text);
    }

    #[test]
    fn segments_are_never_empty((text, spans) in text_and_spans()) {
        for seg in segment(&text, &spans) {
            prop_assert!(!seg.text().is_empty());
        }
    }

    #[test]
    fn plain_segments_never_adjacent((text, spans) in text_and_spans()) {
        let segs = segment(&text, &spans);
        for pair in segs.windows(2) {
            prop_assert!(pair[0].is_highlighted() || pair[1].is_highlighted());
        }
    }

    #[test]
    fn highlighted_text_comes_from_a_valid_span((text, spans) in text_and_spans()) {
        let len = text.chars().count();
        let labels: Vec<&str> = spans
            .iter()
            .filter(|s| s.bounds(len).is_ok())
            .map(|s| s.label.as_str())
            .collect();
        for seg in segment(&text, &spans) {
            if let Some(label) = seg.label() {
                prop_assert!(labels.contains(&label));
            }
        }
    }

    #[test]
    fn segmentation_ignores_span_order((text, mut spans) in text_and_spans()) {
        // Full ties resolve by input order, so only distinct ranges are shuffled.
        spans.sort_by_key(|s| (s.start, s.end));
        spans.dedup_by_key(|s| (s.start, s.end));
        let forward = segment(&text, &spans);
        spans.reverse();
        let backward = segment(&text, &spans);
        prop_assert_eq!(forward, backward);
    }
}

// ── Scorer and validator ──

proptest! {
    #[test]
    fn identical_non_null_values_score_100(v in field_value_strategy()) {
        prop_assume!(!v.is_null());
        prop_assert_eq!(score(&v, &v, &ValidationPolicy::default()), 100);
    }

    #[test]
    fn score_is_bounded(a in field_value_strategy(), b in field_value_strategy()) {
        prop_assert!(score(&a, &b, &ValidationPolicy::default()) <= 100);
    }

    #[test]
    fn non_numeric_scores_are_all_or_nothing(a in "[ a-zA-Z%]{0,10}", b in "[ a-zA-Z%]{0,10}") {
        let s = score(&FieldValue::Text(a), &FieldValue::Text(b), &ValidationPolicy::default());
        prop_assert!(s == 0 || s == 100);
    }

    #[test]
    fn status_depends_only_on_confidence(c in 0u8..=100) {
        let policy = ValidationPolicy::default();
        let status = ValidationStatus::from_confidence(c, &policy);
        let expected = if c == 100 {
            ValidationStatus::Validated
        } else if c >= 80 {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Error
        };
        prop_assert_eq!(status, expected);
    }

    #[test]
    fn one_result_per_non_structural_field(extracted in record_strategy(), expected in record_strategy()) {
        let policy = ValidationPolicy::default();
        let results = validate(&extracted, &expected, &policy);
        let fields: Vec<&str> = extracted.keys().filter(|k| !policy.is_excluded(k)).collect();
        let got: Vec<&str> = results.iter().map(|r| r.field.as_str()).collect();
        prop_assert_eq!(got, fields);
        for r in &results {
            prop_assert_eq!(r.status, ValidationStatus::from_confidence(r.confidence, &policy));
        }
    }

    #[test]
    fn summary_counts_add_up(extracted in record_strategy(), expected in record_strategy()) {
        let results = validate(&extracted, &expected, &ValidationPolicy::default());
        let s = summarize(&results);
        prop_assert_eq!(s.total, results.len());
        prop_assert_eq!(s.validated + s.warning + s.error, s.total);
        prop_assert!(s.completion_rate <= 100);
        if s.total == 0 {
            prop_assert_eq!(s.completion_rate, 0);
        }
    }
}
