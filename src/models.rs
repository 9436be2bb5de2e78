use chrono::{DateTime, Month, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Envelope used by every JSON endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

// ===== Archive Models =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: i64,
    /// Platform chat type (`private`, `group`, `supergroup`, `channel`).
    pub kind: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub from_id: Option<i64>,
    pub from_name: Option<String>,
    /// Send time in epoch seconds, as stored.
    pub date: i64,
    pub sent_at: DateTime<Utc>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_bot: bool,
}

impl ChatUser {
    /// `@username` when the user has one, otherwise the full name.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.last_name) {
            (Some(username), _) => format!("@{username}"),
            (None, Some(last)) => format!("{} {}", self.first_name, last),
            (None, None) => self.first_name.clone(),
        }
    }
}

// ===== Calendar Models =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarYears {
    pub chat_id: i64,
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct MonthEntry {
    /// Calendar month, 1 = January.
    pub number: u32,
    pub name: String,
}

impl MonthEntry {
    pub fn from_number(number: u32) -> Option<Self> {
        let month = Month::try_from(u8::try_from(number).ok()?).ok()?;
        Some(Self {
            number,
            name: month.name().to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarMonths {
    pub chat_id: i64,
    pub year: i32,
    pub months: Vec<MonthEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDays {
    pub chat_id: i64,
    pub year: i32,
    pub month: u32,
    pub days: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: Option<&str>, last_name: Option<&str>) -> ChatUser {
        ChatUser {
            id: 1,
            username: username.map(str::to_string),
            first_name: "Ann".to_string(),
            last_name: last_name.map(str::to_string),
            is_bot: false,
        }
    }

    #[test]
    fn display_name_prefers_username() {
        assert_eq!(user(Some("ann"), Some("Lee")).display_name(), "@ann");
        assert_eq!(user(None, Some("Lee")).display_name(), "Ann Lee");
        assert_eq!(user(None, None).display_name(), "Ann");
    }

    #[test]
    fn month_entry_names() {
        assert_eq!(
            MonthEntry::from_number(1),
            Some(MonthEntry {
                number: 1,
                name: "January".to_string()
            })
        );
        assert_eq!(MonthEntry::from_number(12).unwrap().name, "December");
        assert_eq!(MonthEntry::from_number(0), None);
        assert_eq!(MonthEntry::from_number(13), None);
    }
}
