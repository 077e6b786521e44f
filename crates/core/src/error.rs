#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Materialization failed: {0}")]
    Materialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
