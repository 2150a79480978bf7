use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(u64),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Duplicate {key} \"{value}\": already held by record {holder}")]
    Conflict {
        key: &'static str,
        value: String,
        holder: u64,
    },

    #[error("Cannot move from {from} back to {to} without elevated access")]
    BackwardTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Entering {stage} requires {requirement}")]
    TransitionGate {
        stage: &'static str,
        requirement: &'static str,
    },

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
