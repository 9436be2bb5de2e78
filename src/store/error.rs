use rocket_db_pools::sqlx;
use thiserror::Error;

/// Errors raised while reading the message archive.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query could not be executed (connectivity, pool, or SQL failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A row came back but could not be interpreted.
    #[error("failed to decode {record} record: {reason}")]
    Decode { record: &'static str, reason: String },
    /// A lookup by name matched nothing.
    #[error("no user matches '{0}'")]
    NotFound(String),
    /// A lookup by name matched more than one record.
    #[error("'{query}' matches {} users: {}", candidates.len(), candidates.join(", "))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
}

impl StoreError {
    pub fn decode(record: &'static str, err: sqlx::Error) -> Self {
        StoreError::Decode {
            record,
            reason: err.to_string(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
