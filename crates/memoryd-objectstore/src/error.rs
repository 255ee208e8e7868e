use thiserror::Error;

/// §7 splits transport failures into Retryable and Terminal; the
/// adapter is where that split first gets made, from whatever
/// backend-specific status code or io error actually occurred.
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("retryable: {0}")]
    Retryable(String),
    #[error("terminal: {0}")]
    Terminal(String),
}

impl ObjectStoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ObjectStoreError::Retryable(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ObjectStoreError::Terminal(_))
    }
}
