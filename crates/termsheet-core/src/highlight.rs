//! Highlight span composition.
//!
//! Turns extracted document text plus a bag of labelled character ranges into
//! a flat, gap-filled run of segments ready for rendering. Spans may arrive
//! unsorted and overlapping; the output never overlaps and always
//! concatenates back to the input text.
//!
//! Offsets count Unicode scalar values (`char`s), not bytes.
//!
//! Overlap policy is first-wins: once a span has been emitted, a later span
//! starting inside it contributes only its tail past the cursor, or nothing.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// A labelled character range supplied by the extraction service.
///
/// Offsets are signed so that negative values from a faulty upstream can be
/// detected and rejected rather than failing deserialisation of the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SpanWire")]
pub struct HighlightSpan {
    pub label: String,
    pub value: Option<String>,
    pub start: i64,
    pub end: i64,
}

impl HighlightSpan {
    pub fn new(label: impl Into<String>, value: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            label: label.into(),
            value: Some(value.into()),
            start,
            end,
        }
    }

    /// Check the span against a text of `len` chars and return its bounds.
    pub fn bounds(&self, len: usize) -> Result<(usize, usize), SpanRejection> {
        if self.start < 0 || self.end < 0 {
            return Err(SpanRejection::Negative);
        }
        if self.start > self.end {
            return Err(SpanRejection::Inverted);
        }
        let (start, end) = (self.start as usize, self.end as usize);
        if end > len {
            return Err(SpanRejection::OutOfBounds { len });
        }
        Ok((start, end))
    }
}

/// Accepts both the flat form `{label, value, start, end}` and the dashboard
/// form `{term, value, position: {start, end}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SpanWire {
    Flat {
        #[serde(alias = "term")]
        label: String,
        #[serde(default)]
        value: Option<String>,
        start: i64,
        end: i64,
    },
    Positioned {
        #[serde(alias = "label")]
        term: String,
        #[serde(default)]
        value: Option<String>,
        position: Position,
    },
}

#[derive(Deserialize)]
struct Position {
    start: i64,
    end: i64,
}

impl From<SpanWire> for HighlightSpan {
    fn from(wire: SpanWire) -> Self {
        match wire {
            SpanWire::Flat {
                label,
                value,
                start,
                end,
            } => Self {
                label,
                value,
                start,
                end,
            },
            SpanWire::Positioned {
                term,
                value,
                position,
            } => Self {
                label: term,
                value,
                start: position.start,
                end: position.end,
            },
        }
    }
}

/// Decode a span list one element at a time.
///
/// A span with a missing, null or fractional offset is logged and dropped;
/// the rest of the list survives. Null decodes as no spans.
pub fn decode_spans(value: Value) -> Vec<HighlightSpan> {
    let items = match value {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        other => {
            warn!(kind = json_kind(&other), "highlight spans are not a list, ignoring");
            return Vec::new();
        }
    };
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<HighlightSpan>(item) {
            Ok(span) => Some(span),
            Err(error) => {
                warn!(index, %error, "dropping undecodable highlight span");
                None
            }
        })
        .collect()
}

/// `deserialize_with` adapter for an optional span list, via [`decode_spans`].
pub fn deserialize_lenient_spans<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<HighlightSpan>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(decode_spans))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Why a span was left out of the segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanRejection {
    Negative,
    Inverted,
    OutOfBounds { len: usize },
}

impl fmt::Display for SpanRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negative => f.write_str("negative offset"),
            Self::Inverted => f.write_str("start after end"),
            Self::OutOfBounds { len } => write!(f, "end beyond text length {len}"),
        }
    }
}

/// One contiguous piece of the rendered text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextSegment {
    Plain {
        text: String,
    },
    Highlighted {
        text: String,
        label: String,
        value: Option<String>,
    },
}

impl TextSegment {
    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Highlighted { text, .. } => text,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Plain { .. } => None,
            Self::Highlighted { label, .. } => Some(label),
        }
    }

    pub fn is_highlighted(&self) -> bool {
        matches!(self, Self::Highlighted { .. })
    }
}

/// Segment `text` by `spans`.
///
/// Malformed spans are logged and skipped. Zero-length spans produce nothing.
/// No spans yields one plain segment; empty text yields no segments.
pub fn segment(text: &str, spans: &[HighlightSpan]) -> Vec<TextSegment> {
    if text.is_empty() {
        return Vec::new();
    }

    let index = CharIndex::new(text);
    let len = index.len();

    let mut accepted: Vec<(usize, usize, &HighlightSpan)> = spans
        .iter()
        .filter_map(|span| match span.bounds(len) {
            Ok((start, end)) => Some((start, end, span)),
            Err(reason) => {
                warn!(
                    label = %span.label,
                    start = span.start,
                    end = span.end,
                    %reason,
                    "rejecting highlight span"
                );
                None
            }
        })
        .collect();

    // Stable: full ties keep their input order.
    accepted.sort_by_key(|&(start, end, _)| (start, end));

    let mut out = Vec::with_capacity(accepted.len() * 2 + 1);
    let mut cursor = 0usize;

    for (start, end, span) in accepted {
        if start == end || end <= cursor {
            continue;
        }
        if start > cursor {
            out.push(TextSegment::Plain {
                text: index.slice(cursor, start).to_string(),
            });
        }
        let from = start.max(cursor);
        out.push(TextSegment::Highlighted {
            text: index.slice(from, end).to_string(),
            label: span.label.clone(),
            value: span.value.clone(),
        });
        cursor = end;
    }

    if cursor < len {
        out.push(TextSegment::Plain {
            text: index.slice(cursor, len).to_string(),
        });
    }
    out
}

/// Char-offset to byte-offset table for slicing on char boundaries.
struct CharIndex<'a> {
    text: &'a str,
    // offsets[i] is the byte offset of char i; the last entry is text.len().
    offsets: Vec<usize>,
}

impl<'a> CharIndex<'a> {
    fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(segments: &[TextSegment]) -> String {
        segments.iter().map(TextSegment::text).collect()
    }

    #[test]
    fn no_spans_yields_single_plain_segment() {
        let segs = segment("Notional: $20M", &[]);
        assert_eq!(
            segs,
            vec![TextSegment::Plain {
                text: "Notional: $20M".into()
            }]
        );
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(segment("", &[]).is_empty());
        assert!(segment("", &[HighlightSpan::new("A", "a", 0, 0)]).is_empty());
    }

    #[test]
    fn gaps_are_filled_with_plain_text() {
        let text = "Rate: 3.25% fixed";
        let spans = [HighlightSpan::new("Fixed Rate", "3.25%", 6, 11)];
        let segs = segment(text, &spans);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].text(), "Rate: ");
        assert_eq!(segs[1].text(), "3.25%");
        assert_eq!(segs[1].label(), Some("Fixed Rate"));
        assert_eq!(segs[2].text(), " fixed");
        assert_eq!(concat(&segs), text);
    }

    #[test]
    fn unsorted_spans_are_ordered() {
        let text = "aaaa bbbb cccc";
        let spans = [
            HighlightSpan::new("C", "c", 10, 14),
            HighlightSpan::new("A", "a", 0, 4),
        ];
        let segs = segment(text, &spans);
        let labels: Vec<Option<&str>> = segs.iter().map(TextSegment::label).collect();
        assert_eq!(labels, vec![Some("A"), None, Some("C")]);
        assert_eq!(concat(&segs), text);
    }

    #[test]
    fn overlap_keeps_only_tail() {
        let text = "01234567890123456789";
        let spans = [
            HighlightSpan::new("B", "b", 5, 15),
            HighlightSpan::new("A", "a", 0, 10),
        ];
        let segs = segment(text, &spans);
        assert_eq!(
            segs,
            vec![
                TextSegment::Highlighted {
                    text: "0123456789".into(),
                    label: "A".into(),
                    value: Some("a".into()),
                },
                TextSegment::Highlighted {
                    text: "01234".into(),
                    label: "B".into(),
                    value: Some("b".into()),
                },
                TextSegment::Plain {
                    text: "56789".into()
                },
            ]
        );
    }

    #[test]
    fn contained_span_is_dropped() {
        let text = "0123456789";
        let spans = [
            HighlightSpan::new("Outer", "o", 0, 8),
            HighlightSpan::new("Inner", "i", 2, 5),
        ];
        let segs = segment(text, &spans);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].label(), Some("Outer"));
        assert!(!segs[1].is_highlighted());
    }

    #[test]
    fn same_start_prefers_shorter_span() {
        let text = "0123456789";
        let spans = [
            HighlightSpan::new("Long", "l", 0, 6),
            HighlightSpan::new("Short", "s", 0, 3),
        ];
        let segs = segment(text, &spans);
        assert_eq!(segs[0].label(), Some("Short"));
        assert_eq!(segs[0].text(), "012");
        assert_eq!(segs[1].label(), Some("Long"));
        assert_eq!(segs[1].text(), "345");
    }

    #[test]
    fn malformed_spans_are_skipped() {
        let text = "0123456789";
        let spans = [
            HighlightSpan::new("Neg", "n", -1, 3),
            HighlightSpan::new("Inv", "i", 6, 4),
            HighlightSpan::new("Far", "f", 8, 11),
            HighlightSpan::new("Ok", "k", 2, 4),
        ];
        let segs = segment(text, &spans);
        let labels: Vec<Option<&str>> = segs.iter().map(TextSegment::label).collect();
        assert_eq!(labels, vec![None, Some("Ok"), None]);
        assert_eq!(concat(&segs), text);
    }

    #[test]
    fn zero_length_span_does_not_split_text() {
        let segs = segment("abcdef", &[HighlightSpan::new("Z", "z", 3, 3)]);
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].text(), "abcdef");
    }

    #[test]
    fn span_covering_whole_text() {
        let segs = segment("SOFR", &[HighlightSpan::new("Index", "SOFR", 0, 4)]);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].is_highlighted());
    }

    #[test]
    fn offsets_count_chars_not_bytes() {
        let text = "Prix: 1,25 € par action";
        let spans = [HighlightSpan::new("Price", "1,25 €", 6, 12)];
        let segs = segment(text, &spans);
        assert_eq!(segs[1].text(), "1,25 €");
        assert_eq!(concat(&segs), text);
    }

    #[test]
    fn bounds_reasons() {
        assert_eq!(HighlightSpan::new("x", "", -2, 1).bounds(5), Err(SpanRejection::Negative));
        assert_eq!(HighlightSpan::new("x", "", 3, 1).bounds(5), Err(SpanRejection::Inverted));
        assert_eq!(
            HighlightSpan::new("x", "", 3, 6).bounds(5),
            Err(SpanRejection::OutOfBounds { len: 5 })
        );
        assert_eq!(HighlightSpan::new("x", "", 0, 5).bounds(5), Ok((0, 5)));
    }

    #[test]
    fn deserializes_flat_and_positioned_forms() {
        let json = r#"[
            {"label": "Amount", "value": "$2M", "start": 131, "end": 134},
            {"term": "Valuation", "value": "$10M pre-money", "position": {"start": 108, "end": 123}},
            {"term": "Fixed Rate", "value": null, "position": {"start": 190, "end": 210}}
        ]"#;
        let spans: Vec<HighlightSpan> = serde_json::from_str(json).unwrap();
        assert_eq!(spans[0], HighlightSpan::new("Amount", "$2M", 131, 134));
        assert_eq!(spans[1], HighlightSpan::new("Valuation", "$10M pre-money", 108, 123));
        assert_eq!(spans[2].value, None);
        assert_eq!((spans[2].start, spans[2].end), (190, 210));
    }

    #[test]
    fn undecodable_spans_are_dropped_individually() {
        let json = serde_json::json!([
            {"term": "Notional", "value": "20000000", "position": {"start": null, "end": 18}},
            {"term": "Fixed Rate", "value": "3.25%", "position": {"start": 36, "end": 41}},
            {"label": "Currency", "start": 2.5, "end": 5},
            {"label": "Maturity"},
            "not a span"
        ]);
        let spans = decode_spans(json);
        assert_eq!(spans, vec![HighlightSpan::new("Fixed Rate", "3.25%", 36, 41)]);
    }

    #[test]
    fn null_or_scalar_span_list_decodes_empty() {
        assert!(decode_spans(Value::Null).is_empty());
        assert!(decode_spans(serde_json::json!({"term": "x"})).is_empty());
    }

    #[test]
    fn segments_serialize_with_kind_tag() {
        let seg = TextSegment::Highlighted {
            text: "$2M".into(),
            label: "Amount".into(),
            value: Some("$2M".into()),
        };
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["kind"], "highlighted");
        assert_eq!(json["label"], "Amount");
    }
}
