//! Validation policy: thresholds and structural-key exclusions.
//!
//! The numeric tolerance and warning cut-off are domain policy rather than
//! engine logic, so they live here and can be overridden from a TOML file:
//!
//! ```toml
//! warning_threshold = 90
//! excluded_fields = ["_id", "traderId", "rowId"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::normalize::lookup_key;

/// Keys that identify records rather than describe financial terms.
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &["_id", "id", "traderId"];

/// Sentinel shown as the expected value when the reference record has no matching field.
pub const NOT_AVAILABLE: &str = "not available";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    /// Minimum confidence for `validated`. Default: 100 (exact match only).
    pub validated_threshold: u8,
    /// Minimum confidence for `warning`. Default: 80.
    pub warning_threshold: u8,
    /// Denominator floor in the relative-error formula. Default: 1.0.
    pub numeric_floor: f64,
    /// Structural keys skipped before validation (compared by lookup key).
    pub excluded_fields: Vec<String>,
    /// Expected-value text used when the reference has no matching field.
    pub not_available: String,
    /// Relative tolerance for quote notional vs. base notional times FX spot.
    /// Default: 0.0001.
    pub fx_tolerance: f64,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            validated_threshold: 100,
            warning_threshold: 80,
            numeric_floor: 1.0,
            excluded_fields: DEFAULT_EXCLUDED_FIELDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            not_available: NOT_AVAILABLE.to_string(),
            fx_tolerance: 0.0001,
        }
    }
}

impl ValidationPolicy {
    /// Parse and check a policy from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let policy: Self = toml::from_str(s)?;
        policy.check()?;
        Ok(policy)
    }

    /// Load a policy file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let policy = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            validated_threshold = policy.validated_threshold,
            warning_threshold = policy.warning_threshold,
            "loaded validation policy"
        );
        Ok(policy)
    }

    /// Reject threshold combinations that would make a status unreachable or ill-defined.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.validated_threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "validated_threshold {} exceeds 100",
                self.validated_threshold
            )));
        }
        if self.warning_threshold > self.validated_threshold {
            return Err(ConfigError::Invalid(format!(
                "warning_threshold {} exceeds validated_threshold {}",
                self.warning_threshold, self.validated_threshold
            )));
        }
        if !(self.numeric_floor.is_finite() && self.numeric_floor > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "numeric_floor must be a positive number, got {}",
                self.numeric_floor
            )));
        }
        if !(self.fx_tolerance.is_finite() && self.fx_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "fx_tolerance must be a non-negative number, got {}",
                self.fx_tolerance
            )));
        }
        Ok(())
    }

    /// Whether a field name is a structural key to skip.
    pub fn is_excluded(&self, field: &str) -> bool {
        let key = lookup_key(field);
        self.excluded_fields.iter().any(|f| lookup_key(f) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = ValidationPolicy::default();
        assert_eq!(p.validated_threshold, 100);
        assert_eq!(p.warning_threshold, 80);
        assert_eq!(p.numeric_floor, 1.0);
        assert_eq!(p.not_available, "not available");
        assert_eq!(p.fx_tolerance, 0.0001);
        assert!(p.check().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let p = ValidationPolicy::from_toml_str("warning_threshold = 90\n").unwrap();
        assert_eq!(p.warning_threshold, 90);
        assert_eq!(p.validated_threshold, 100);
        assert!(p.is_excluded("_id"));
    }

    #[test]
    fn empty_toml_is_default() {
        let p = ValidationPolicy::from_toml_str("").unwrap();
        assert_eq!(p, ValidationPolicy::default());
    }

    #[test]
    fn rejects_warning_above_validated() {
        let err = ValidationPolicy::from_toml_str(
            "validated_threshold = 90\nwarning_threshold = 95\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_validated_above_100() {
        let err = ValidationPolicy::from_toml_str("validated_threshold = 120\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_non_positive_floor() {
        let err = ValidationPolicy::from_toml_str("numeric_floor = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_fx_tolerance() {
        let err = ValidationPolicy::from_toml_str("fx_tolerance = -0.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let p = ValidationPolicy::from_toml_str("fx_tolerance = 0.01\n").unwrap();
        assert_eq!(p.fx_tolerance, 0.01);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ValidationPolicy::from_toml_str("warning_threshold = \"high\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn exclusion_is_normalisation_tolerant() {
        let p = ValidationPolicy::default();
        assert!(p.is_excluded("trader_id"));
        assert!(p.is_excluded("TraderId"));
        assert!(p.is_excluded("ID"));
        assert!(!p.is_excluded("TradeId"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = ValidationPolicy::load(Path::new("/nonexistent/termsheet.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
