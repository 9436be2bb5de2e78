//! Service health endpoint used for readiness checks and tests.

use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarIndex;

/// Health payload with calendar background state.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Static status string reporting application readiness.
    pub status: String,
    /// Zone used for calendar decomposition.
    pub calendar_zone: String,
    /// Population batches not merged yet.
    pub pending_population: usize,
}

#[openapi(tag = "Health")]
#[get("/health")]
pub fn health_check(calendar: &State<CalendarIndex>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        calendar_zone: calendar.zone().to_string(),
        pending_population: calendar.population().pending(),
    })
}
