//! Tagged scalar values and insertion-ordered field records.
//!
//! Term sheet records arrive as loosely-typed JSON objects. [`FieldValue`]
//! pins each value to one of three kinds so the scorer can branch on
//! numeric vs. textual comparison explicitly, and [`FieldRecord`] keeps the
//! source object's key order so validation output follows the document.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single scalar field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Numeric(f64),
    Text(String),
    Null,
}

impl FieldValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Plain-text rendering used for comparison and export.
    ///
    /// Integral numbers drop the fractional part (`20000000`, not `20000000.0`).
    /// Null renders as the empty string.
    pub fn display_text(&self) -> String {
        match self {
            Self::Numeric(n) => format_number(*n),
            Self::Text(s) => s.clone(),
            Self::Null => String::new(),
        }
    }

    /// Dashboard rendering: numbers as USD currency, text verbatim, null as `-`.
    pub fn display_currency(&self) -> String {
        match self {
            Self::Numeric(n) => format_usd(*n),
            Self::Text(s) => s.clone(),
            Self::Null => "-".to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Numeric(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        Self::Numeric(n as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Numeric),
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Text(b.to_string()),
            // Nested structures are not financial scalars; keep them visible as JSON.
            other => Self::Text(other.to_string()),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Numeric(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Self::Numeric(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from)
    }
}

/// Field name to value mapping that preserves source insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRecord {
    fields: Vec<(String, FieldValue)>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. A repeated key replaces the value in place, keeping
    /// its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Exact-key lookup. Use [`crate::validation`] for normalisation-tolerant matching.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for FieldRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = FieldRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object of field values or null")
    }

    fn visit_unit<E: serde::de::Error>(self) -> Result<FieldRecord, E> {
        Ok(FieldRecord::new())
    }

    fn visit_none<E: serde::de::Error>(self) -> Result<FieldRecord, E> {
        Ok(FieldRecord::new())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldRecord, A::Error> {
        let mut record = FieldRecord::new();
        while let Some((key, value)) = access.next_entry::<String, FieldValue>()? {
            record.insert(key, value);
        }
        Ok(record)
    }
}

// ── Number formatting ──

fn is_integral(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15
}

fn format_number(n: f64) -> String {
    if is_integral(n) {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Format as `$1,234,567.89`; negatives as `-$1,234.50`.
fn format_usd(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    let cents = (n.abs() * 100.0).round() as u128;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if n < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}
