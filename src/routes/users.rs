//! Users seen in the archive.

use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;

use crate::error::ApiError;
use crate::models::{ChatUser, DataResponse};
use crate::store::MessageStore;

#[openapi(tag = "Users")]
#[get("/users")]
pub async fn list_users(
    store: &State<MessageStore>,
) -> Result<Json<DataResponse<Vec<ChatUser>>>, ApiError> {
    let users = store.users().await?;
    Ok(Json(DataResponse::new(users)))
}

/// Look a user up by `@username`, first name, or `First Last`.
///
/// 404 when nobody matches, 409 when the name is shared.
#[openapi(tag = "Users")]
#[get("/users/<name>")]
pub async fn get_user(
    name: &str,
    store: &State<MessageStore>,
) -> Result<Json<DataResponse<ChatUser>>, ApiError> {
    let user = store.user_by_name(name).await?;
    Ok(Json(DataResponse::new(user)))
}
