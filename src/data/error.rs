//! Errors raised while turning raw rows into encoded examples.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// A configured column is absent (or null where a value is required).
    #[error("row {row}: missing column '{column}'")]
    MissingColumn { row: usize, column: String },

    /// A numeric or topic column holds something that is not a number.
    #[error("row {row}: column '{column}' is not numeric (got {value})")]
    NotNumeric { row: usize, column: String, value: String },

    /// The label column must hold 0 or 1.
    #[error("row {row}: label column '{column}' must be 0 or 1 (got {value})")]
    InvalidLabel { row: usize, column: String, value: String },

    /// A categorical column was never fitted.
    #[error("no vocabulary fitted for column '{0}'")]
    UnknownVocabulary(String),

    #[error("max_title_len must be at least 2 to hold [CLS] and [SEP] (got {0})")]
    TitleTooShort(usize),

    #[error("tokenisation failed: {0}")]
    Tokenizer(String),

    /// A batch carries a different number of columns for a modality
    /// than the model was built with.
    #[error("{modality} features: model expects {expected} column(s), batch has {got}")]
    ModalityMismatch { modality: &'static str, expected: usize, got: usize },
}

impl SchemaError {
    pub fn missing(row: usize, column: impl Into<String>) -> Self {
        Self::MissingColumn { row, column: column.into() }
    }

    pub fn not_numeric(row: usize, column: impl Into<String>, value: &serde_json::Value) -> Self {
        Self::NotNumeric { row, column: column.into(), value: value.to_string() }
    }
}
