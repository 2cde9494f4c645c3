//! Error types for RentX records.

use thiserror::Error;

/// Errors that can occur when interpreting records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Record is not a JSON object with a non-empty string `id`
    #[error("record has no usable id")]
    MissingId,

    /// JSON (de)serialization failed
    #[error("invalid record json: {0}")]
    Json(#[from] serde_json::Error),

    /// Date field is not ISO-8601
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = RecordError::InvalidDate("yesterday".into());
        assert_eq!(err.to_string(), "invalid date: yesterday");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RecordError>();
    }
}
