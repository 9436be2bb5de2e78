use super::messages::MessageStore;
use super::rows::skip_undecodable;
use crate::models::ChatUser;
use crate::store::StoreError;
use rocket_db_pools::sqlx::{self, Row, postgres::PgRow};

const ALL_USERS: &str = r#"SELECT id, username, first_name, last_name, is_bot FROM users
   ORDER BY id"#;

const USERS_BY_USERNAME: &str = r#"SELECT id, username, first_name, last_name, is_bot FROM users
   WHERE lower(username) = lower($1)
   ORDER BY id"#;

const USERS_BY_FIRST_NAME: &str = r#"SELECT id, username, first_name, last_name, is_bot FROM users
   WHERE first_name = $1
   ORDER BY id"#;

const USERS_BY_FULL_NAME: &str = r#"SELECT id, username, first_name, last_name, is_bot FROM users
   WHERE first_name = $1 AND last_name = $2
   ORDER BY id"#;

/// How a user is named in a lookup: `@username`, `First` or `First Last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserQuery<'a> {
    Username(&'a str),
    FirstName(&'a str),
    FullName { first: &'a str, last: &'a str },
}

impl<'a> UserQuery<'a> {
    /// `None` for empty input or more than two name words.
    pub fn parse(input: &'a str) -> Option<Self> {
        let input = input.trim();
        if let Some(username) = input.strip_prefix('@') {
            return (!username.is_empty()).then_some(UserQuery::Username(username));
        }

        let mut words = input.split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (Some(first), None, None) => Some(UserQuery::FirstName(first)),
            (Some(first), Some(last), None) => Some(UserQuery::FullName { first, last }),
            _ => None,
        }
    }
}

impl MessageStore {
    /// All known users ordered by id.
    pub async fn users(&self) -> Result<Vec<ChatUser>, StoreError> {
        let rows = sqlx::query(ALL_USERS)
            .fetch_all(&self.pool)
            .await?;

        Ok(skip_undecodable(&rows, decode_user))
    }

    /// The single user named by `name` (see [`UserQuery`]).
    ///
    /// Fails with [`StoreError::NotFound`] when nothing matches and with
    /// [`StoreError::Ambiguous`] when several users share the name.
    pub async fn user_by_name(&self, name: &str) -> Result<ChatUser, StoreError> {
        let query = UserQuery::parse(name).ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let rows = match query {
            UserQuery::Username(username) => {
                sqlx::query(USERS_BY_USERNAME)
                    .bind(username)
                    .fetch_all(&self.pool)
                    .await?
            }
            UserQuery::FirstName(first) => {
                sqlx::query(USERS_BY_FIRST_NAME)
                    .bind(first)
                    .fetch_all(&self.pool)
                    .await?
            }
            UserQuery::FullName { first, last } => {
                sqlx::query(USERS_BY_FULL_NAME)
                    .bind(first)
                    .bind(last)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut users = skip_undecodable(&rows, decode_user);
        match users.len() {
            0 => Err(StoreError::NotFound(name.to_string())),
            1 => Ok(users.remove(0)),
            _ => Err(StoreError::Ambiguous {
                query: name.to_string(),
                candidates: users.iter().map(ChatUser::display_name).collect(),
            }),
        }
    }
}

fn decode_user(row: &PgRow) -> Result<ChatUser, StoreError> {
    let decode = |err| StoreError::decode("user", err);
    Ok(ChatUser {
        id: row.try_get("id").map_err(decode)?,
        username: row.try_get("username").map_err(decode)?,
        first_name: row.try_get("first_name").map_err(decode)?,
        last_name: row.try_get("last_name").map_err(decode)?,
        is_bot: row.try_get("is_bot").map_err(decode)?,
    })
}
