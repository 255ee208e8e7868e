use thiserror::Error;

/// Concrete ingestion-side taxonomy for spec §7's error kinds.
/// `Validation` and `Terminal` are never retried; `Retryable` feeds
/// the backoff loop; `Capacity` is surfaced with a retry-after hint
/// and never counted against a circuit breaker.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("retryable: {0}")]
    Retryable(String),
    #[error("terminal: {0}")]
    Terminal(String),
    #[error("capacity: {0}")]
    Capacity(String),
}

impl IngestError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Retryable(_))
    }
}

impl From<memoryd_objectstore::ObjectStoreError> for IngestError {
    fn from(err: memoryd_objectstore::ObjectStoreError) -> Self {
        if err.is_retryable() {
            IngestError::Retryable(err.to_string())
        } else {
            IngestError::Terminal(err.to_string())
        }
    }
}

impl From<memoryd_encoder::EncodeError> for IngestError {
    fn from(err: memoryd_encoder::EncodeError) -> Self {
        match err {
            memoryd_encoder::EncodeError::InputTooLarge => IngestError::Validation(err.to_string()),
            memoryd_encoder::EncodeError::Unavailable(_) => IngestError::Retryable(err.to_string()),
        }
    }
}
