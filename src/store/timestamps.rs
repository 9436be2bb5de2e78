use super::rows::skip_undecodable;
use crate::calendar::TimeRange;
use crate::store::StoreError;
use rocket_db_pools::sqlx::{self, PgPool, Row, postgres::PgRow};

const ALL_TIMESTAMPS: &str = r#"SELECT date FROM messages
   WHERE chat_id = $1
   ORDER BY date"#;

const TIMESTAMPS_BETWEEN: &str = r#"SELECT date FROM messages
   WHERE chat_id = $1 AND date >= $2 AND date < $3
   ORDER BY date"#;

/// Source of message timestamps for the calendar index.
///
/// Implementations return epoch seconds in ascending order. A range with no
/// messages yields an empty vector, not an error.
#[rocket::async_trait]
pub trait TimestampSource: Send + Sync {
    async fn timestamps(&self, chat_id: i64, range: TimeRange) -> Result<Vec<i64>, StoreError>;
}

/// [`TimestampSource`] backed by the `messages` table.
#[derive(Debug, Clone)]
pub struct PgTimestampSource {
    pool: PgPool,
}

impl PgTimestampSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl TimestampSource for PgTimestampSource {
    async fn timestamps(&self, chat_id: i64, range: TimeRange) -> Result<Vec<i64>, StoreError> {
        let rows = match range {
            TimeRange::All => {
                sqlx::query(ALL_TIMESTAMPS)
                    .bind(chat_id)
                    .fetch_all(&self.pool)
                    .await?
            }
            TimeRange::Between { start, end } => {
                sqlx::query(TIMESTAMPS_BETWEEN)
                    .bind(chat_id)
                    .bind(start)
                    .bind(end)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let timestamps = skip_undecodable(&rows, |row: &PgRow| {
            row.try_get::<i64, _>("date")
                .map_err(|err| StoreError::decode("message timestamp", err))
        });

        log::debug!(
            "chat {}: loaded {} timestamps for {:?}",
            chat_id,
            timestamps.len(),
            range
        );

        Ok(timestamps)
    }
}
