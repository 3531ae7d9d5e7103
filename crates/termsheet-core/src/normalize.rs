//! Field-name and value normalisation.
//!
//! Extracted and reference records rarely agree on key spelling: the
//! extraction service emits `notional_amount`, the risk system `NotionalAmount`,
//! a hand-keyed sheet `Notional Amount`. Three normal forms are used:
//!
//! - [`lookup_key`]: case-folded, separators stripped. Used to pair keys.
//! - [`display_term`]: underscores to spaces, each word capitalised. Shown to users.
//! - [`normalize_text`]: trimmed and case-folded. Used to compare textual values.

/// Characters treated as word separators in field names.
const SEPARATORS: &[char] = &[' ', '_', '-', '.'];

/// Normalise a field name into a matching key.
///
/// `"Trade_Id"`, `"Trade Id"`, `"TradeId"` and `"trade-id"` all become `"tradeid"`.
pub fn lookup_key(name: &str) -> String {
    name.chars()
        .filter(|c| !SEPARATORS.contains(c) && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalise a field name for display.
///
/// Underscores become spaces and the first letter of each word is upper-cased;
/// the rest of each word is left as written, so `"notional_amount"` becomes
/// `"Notional Amount"` and `"fixedRate"` becomes `"FixedRate"`.
pub fn display_term(name: &str) -> String {
    name.split(|c: char| c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalise a textual value for equality comparison.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
