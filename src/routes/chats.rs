//! Archive listings: chats, and the messages of one calendar day.

use chrono::NaiveDate;
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

use crate::calendar::{CalendarIndex, TimeRange};
use crate::error::ApiError;
use crate::models::{ChatMessage, ChatSummary, DataResponse};
use crate::store::MessageStore;

/// All archived chats.
#[openapi(tag = "Chats")]
#[get("/chats")]
pub async fn list_chats(
    store: &State<MessageStore>,
) -> Result<Json<DataResponse<Vec<ChatSummary>>>, ApiError> {
    let chats = store.chats().await?;
    Ok(Json(DataResponse::new(chats)))
}

/// Whole history of a chat, oldest first.
#[openapi(tag = "Chats")]
#[get("/chats/<chat_id>/messages")]
pub async fn list_messages(
    chat_id: i64,
    store: &State<MessageStore>,
) -> Result<Json<DataResponse<Vec<ChatMessage>>>, ApiError> {
    let messages = store.messages(chat_id, TimeRange::All).await?;
    Ok(Json(DataResponse::new(messages)))
}

/// Messages sent on one day, in the calendar zone of the index.
#[openapi(tag = "Chats")]
#[get("/chats/<chat_id>/messages/<year>/<month>/<day>")]
pub async fn list_day_messages(
    chat_id: i64,
    year: i32,
    month: u32,
    day: u32,
    store: &State<MessageStore>,
    calendar: &State<CalendarIndex>,
) -> Result<Json<DataResponse<Vec<ChatMessage>>>, ApiError> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid date {year}-{month:02}-{day:02}")))?;
    let range = calendar
        .zone()
        .day_range(date)
        .ok_or_else(|| ApiError::BadRequest(format!("date {date} is out of range")))?;

    let messages = store.messages(chat_id, range).await?;
    Ok(Json(DataResponse::new(messages)))
}
