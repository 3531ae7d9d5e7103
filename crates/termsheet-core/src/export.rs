//! Arrow schema and batch builders for validation results.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, StringArray, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::ExportError;
use crate::validation::{TradeValidation, ValidationResult};
use crate::value::FieldValue;

/// One row per validated field.
///
/// Values are kept twice: as display text (always present unless null) and
/// as a float for numeric fields, so downstream queries can aggregate on
/// notional or rate without re-parsing.
pub fn validation_result_schema() -> Schema {
    Schema::new(vec![
        Field::new("trade_id", DataType::Utf8, true),
        Field::new("term", DataType::Utf8, false),
        Field::new("field", DataType::Utf8, false),
        Field::new("reference_key", DataType::Utf8, true),
        Field::new("extracted_value", DataType::Utf8, true),
        Field::new("expected_value", DataType::Utf8, true),
        Field::new("extracted_numeric", DataType::Float64, true),
        Field::new("expected_numeric", DataType::Float64, true),
        Field::new("confidence", DataType::UInt8, false),
        Field::new("status", DataType::Utf8, false),
    ])
}

/// Results of a single record pair; `trade_id` is null on every row.
pub fn results_to_batch(results: &[ValidationResult]) -> Result<RecordBatch, ExportError> {
    let rows: Vec<(Option<&str>, &ValidationResult)> = results.iter().map(|r| (None, r)).collect();
    build(&rows)
}

/// Results of a batch run, flattened with their trade id.
pub fn trades_to_batch(trades: &[TradeValidation]) -> Result<RecordBatch, ExportError> {
    let rows: Vec<(Option<&str>, &ValidationResult)> = trades
        .iter()
        .flat_map(|t| t.results.iter().map(move |r| (Some(t.trade_id.as_str()), r)))
        .collect();
    build(&rows)
}

fn build(rows: &[(Option<&str>, &ValidationResult)]) -> Result<RecordBatch, ExportError> {
    let schema: SchemaRef = Arc::new(validation_result_schema());

    let trade_id = StringArray::from(rows.iter().map(|(t, _)| *t).collect::<Vec<_>>());
    let term = StringArray::from_iter_values(rows.iter().map(|(_, r)| r.term.as_str()));
    let field = StringArray::from_iter_values(rows.iter().map(|(_, r)| r.field.as_str()));
    let reference_key = StringArray::from(
        rows.iter()
            .map(|(_, r)| r.reference_key.as_deref())
            .collect::<Vec<_>>(),
    );
    let extracted_value = text_column(rows.iter().map(|(_, r)| &r.extracted_value));
    let expected_value = text_column(rows.iter().map(|(_, r)| &r.expected_value));
    let extracted_numeric: Float64Array = rows.iter().map(|(_, r)| r.extracted_value.as_f64()).collect();
    let expected_numeric: Float64Array = rows.iter().map(|(_, r)| r.expected_value.as_f64()).collect();
    let confidence = UInt8Array::from_iter_values(rows.iter().map(|(_, r)| r.confidence));
    let status = StringArray::from_iter_values(rows.iter().map(|(_, r)| r.status.as_str()));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(trade_id),
        Arc::new(term),
        Arc::new(field),
        Arc::new(reference_key),
        Arc::new(extracted_value),
        Arc::new(expected_value),
        Arc::new(extracted_numeric),
        Arc::new(expected_numeric),
        Arc::new(confidence),
        Arc::new(status),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn text_column<'a>(values: impl Iterator<Item = &'a FieldValue>) -> StringArray {
    values
        .map(|v| (!v.is_null()).then(|| v.display_text()))
        .collect()
}
