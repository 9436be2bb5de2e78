//! Calendar navigation endpoints.
//!
//! Backed by [`CalendarIndex`]; each listing is deduplicated and ascending.

use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

use crate::calendar::{CalendarCacheStats, CalendarIndex};
use crate::error::ApiError;
use crate::models::{CalendarDays, CalendarMonths, CalendarYears, DataResponse, MonthEntry};

/// Years in which the chat has messages.
#[openapi(tag = "Calendar")]
#[get("/chats/<chat_id>/calendar/years")]
pub async fn list_years(
    chat_id: i64,
    calendar: &State<CalendarIndex>,
) -> Result<Json<DataResponse<CalendarYears>>, ApiError> {
    let years = calendar.years(chat_id).await?;

    Ok(Json(DataResponse::new(CalendarYears { chat_id, years })))
}

/// Months of `year` in which the chat has messages.
#[openapi(tag = "Calendar")]
#[get("/chats/<chat_id>/calendar/<year>/months")]
pub async fn list_months(
    chat_id: i64,
    year: i32,
    calendar: &State<CalendarIndex>,
) -> Result<Json<DataResponse<CalendarMonths>>, ApiError> {
    let months = calendar
        .months(chat_id, year)
        .await?
        .into_iter()
        .filter_map(MonthEntry::from_number)
        .collect();

    Ok(Json(DataResponse::new(CalendarMonths {
        chat_id,
        year,
        months,
    })))
}

/// Days of `year`/`month` in which the chat has messages.
#[openapi(tag = "Calendar")]
#[get("/chats/<chat_id>/calendar/<year>/<month>/days")]
pub async fn list_days(
    chat_id: i64,
    year: i32,
    month: u32,
    calendar: &State<CalendarIndex>,
) -> Result<Json<DataResponse<CalendarDays>>, ApiError> {
    let days = calendar.days(chat_id, year, month).await?;

    Ok(Json(DataResponse::new(CalendarDays {
        chat_id,
        year,
        month,
        days,
    })))
}

/// Size of the in-memory calendar cache.
#[openapi(tag = "Calendar")]
#[get("/calendar/stats")]
pub fn cache_stats(calendar: &State<CalendarIndex>) -> Json<DataResponse<CalendarCacheStats>> {
    Json(DataResponse::new(calendar.cache().stats()))
}
