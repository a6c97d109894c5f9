use sea_orm::DbErr;

use crate::hooks::Operation;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("hook `{name}` is already registered for {operation}")]
    Duplicate { operation: Operation, name: String },
}

/// Reading the current row for a snapshot failed. The hook gives up and no
/// entry is written.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("row in `{table}` has no usable primary key")]
    MissingKey { table: String },
    #[error("row `{key}` not found in `{table}`")]
    NotFound { table: String, key: String },
    #[error("failed to read row: {0}")]
    Storage(#[from] DbErr),
    #[error("failed to encode row: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("row did not encode to a JSON object")]
    NotAnObject,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to build audit insert: {0}")]
    Build(String),
    #[error("failed to write audit entry: {0}")]
    Storage(#[from] DbErr),
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}
