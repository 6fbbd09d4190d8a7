use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored value is malformed: {0}")]
    Corrupt(String),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PartitionFailure {
    pub date: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),

    /// Some date partitions committed and some did not. `committed` may be
    /// empty when every partition failed.
    #[error("attendance saved for {} of {} dates", committed.len(), committed.len() + failed.len())]
    PartialApplication {
        committed: Vec<String>,
        failed: Vec<PartitionFailure>,
    },
}

pub type AttendanceResult<T> = Result<T, AttendanceError>;
