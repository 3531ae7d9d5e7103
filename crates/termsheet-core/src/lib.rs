pub mod confidence;
pub mod document;
pub mod error;
pub mod export;
pub mod highlight;
pub mod normalize;
pub mod policy;
pub mod rules;
pub mod summary;
pub mod validation;
pub mod value;

pub use document::{DocumentQuery, DocumentView, IntakeDocument};
pub use error::{ConfigError, ExportError, ParseStatusError};
pub use highlight::{HighlightSpan, TextSegment};
pub use policy::ValidationPolicy;
pub use rules::{Anomaly, Severity, SwapKind};
pub use summary::{DocumentStatus, PortfolioSummary, StatusFilter, ValidationSummary};
pub use validation::{TermsheetPair, TradeValidation, ValidationResult, ValidationStatus};
pub use value::{FieldRecord, FieldValue};
