//! HTTP route handlers grouped by resource.
//!
//! Handlers are annotated with `#[openapi]` so `rocket_okapi` can derive
//! an OpenAPI document automatically.

pub mod calendar;
pub mod chats;
pub mod health;
pub mod users;
