//! View-ready documents: highlight segments and field validation merged
//! into one value for the presentation layer.

use serde::{Deserialize, Serialize};

use crate::highlight::{self, HighlightSpan, TextSegment};
use crate::policy::ValidationPolicy;
use crate::rules::{self, Anomaly, SwapKind};
use crate::summary::{self, DocumentStatus, ValidationSummary};
use crate::validation::{self, ValidationResult};
use crate::value::FieldRecord;

/// A processed document as delivered by the intake service.
///
/// Every payload field is optional: partially processed documents arrive
/// without text, spans, or one of the two records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub upload_date: Option<String>,
    #[serde(default)]
    pub extracted_text: Option<String>,
    #[serde(default, deserialize_with = "highlight::deserialize_lenient_spans")]
    pub highlighted_terms: Option<Vec<HighlightSpan>>,
    #[serde(default)]
    pub extracted: Option<FieldRecord>,
    #[serde(default)]
    pub expected: Option<FieldRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub name: String,
    pub upload_date: Option<String>,
    pub status: DocumentStatus,
    pub segments: Vec<TextSegment>,
    pub results: Vec<ValidationResult>,
    pub summary: ValidationSummary,
    /// Consistency rule findings on the extracted record. Empty when the
    /// swap kind cannot be told from its fields.
    pub anomalies: Vec<Anomaly>,
}

/// Assemble the view for one document.
///
/// Missing text gives no segments. A missing record is treated as empty, so
/// extracted fields without a reference all come back as `error`.
pub fn present(doc: &IntakeDocument, policy: &ValidationPolicy) -> DocumentView {
    let segments = match doc.extracted_text.as_deref() {
        Some(text) => highlight::segment(text, doc.highlighted_terms.as_deref().unwrap_or(&[])),
        None => Vec::new(),
    };

    let empty = FieldRecord::default();
    let extracted = doc.extracted.as_ref().unwrap_or(&empty);
    let results = validation::validate(
        extracted,
        doc.expected.as_ref().unwrap_or(&empty),
        policy,
    );

    let anomalies = match SwapKind::detect(extracted) {
        Some(kind) => rules::check(extracted, kind, policy),
        None => Vec::new(),
    };

    let summary = summary::summarize(&results);
    DocumentView {
        id: doc.id.clone(),
        name: doc.name.clone(),
        upload_date: doc.upload_date.clone(),
        status: DocumentStatus::from_summary(&summary),
        segments,
        results,
        summary,
        anomalies,
    }
}

/// Document list filter: optional status plus case-insensitive name search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub status: Option<DocumentStatus>,
    pub name: Option<String>,
}

pub fn filter_documents<'a>(docs: &'a [DocumentView], query: &DocumentQuery) -> Vec<&'a DocumentView> {
    let needle = query
        .name
        .as_deref()
        .map(|n| n.trim().to_lowercase())
        .unwrap_or_default();
    docs.iter()
        .filter(|d| query.status.is_none_or(|s| d.status == s))
        .filter(|d| needle.is_empty() || d.name.to_lowercase().contains(&needle))
        .collect()
}
