use super::rows::skip_undecodable;
use crate::calendar::TimeRange;
use crate::models::{ChatMessage, ChatSummary};
use crate::store::StoreError;
use chrono::DateTime;
use rocket_db_pools::sqlx::{self, PgPool, Row, postgres::PgRow};

/// Chat and message listings over the archive.
///
/// Bulk listings are partial-success: a row that fails to decode is logged
/// and skipped, the rest of the listing is still returned.
#[derive(Debug, Clone)]
pub struct MessageStore {
    pub(super) pool: PgPool,
}

impl MessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All archived chats ordered by id.
    pub async fn chats(&self) -> Result<Vec<ChatSummary>, StoreError> {
        let rows = sqlx::query("SELECT id, kind, title, username FROM chats ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(skip_undecodable(&rows, decode_chat))
    }

    /// Messages of a chat inside `range`, oldest first.
    pub async fn messages(
        &self,
        chat_id: i64,
        range: TimeRange,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = match range {
            TimeRange::All => {
                sqlx::query(
                    r#"SELECT chat_id, message_id, from_id, from_name, date, text
                       FROM messages
                       WHERE chat_id = $1
                       ORDER BY date, message_id"#,
                )
                .bind(chat_id)
                .fetch_all(&self.pool)
                .await?
            }
            TimeRange::Between { start, end } => {
                sqlx::query(
                    r#"SELECT chat_id, message_id, from_id, from_name, date, text
                       FROM messages
                       WHERE chat_id = $1 AND date >= $2 AND date < $3
                       ORDER BY date, message_id"#,
                )
                .bind(chat_id)
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(skip_undecodable(&rows, decode_message))
    }
}

fn decode_chat(row: &PgRow) -> Result<ChatSummary, StoreError> {
    let decode = |err| StoreError::decode("chat", err);
    Ok(ChatSummary {
        id: row.try_get("id").map_err(decode)?,
        kind: row.try_get("kind").map_err(decode)?,
        title: row.try_get("title").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
    })
}

fn decode_message(row: &PgRow) -> Result<ChatMessage, StoreError> {
    let decode = |err| StoreError::decode("message", err);
    let date: i64 = row.try_get("date").map_err(decode)?;
    let sent_at = DateTime::from_timestamp(date, 0).ok_or_else(|| StoreError::Decode {
        record: "message",
        reason: format!("timestamp {date} is out of range"),
    })?;

    Ok(ChatMessage {
        chat_id: row.try_get("chat_id").map_err(decode)?,
        message_id: row.try_get("message_id").map_err(decode)?,
        from_id: row.try_get("from_id").map_err(decode)?,
        from_name: row.try_get("from_name").map_err(decode)?,
        date,
        sent_at,
        text: row.try_get("text").map_err(decode)?,
    })
}
