//! Brawl id allocation.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/new-brawl-id", get(new_brawl_id))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NewBrawlIdParams {
    /// Id of the player asking to host.
    pub id: Option<String>,
}

/// `GET /new-brawl-id`: allocate a room key that no live brawl is using.
///
/// The key is not reserved; the room only exists once its host connects.
#[utoipa::path(
    get,
    path = "/new-brawl-id",
    tag = "Brawls",
    params(NewBrawlIdParams),
    responses(
        (status = 200, description = "Fresh brawl id", body = String, content_type = "text/plain"),
        (status = 401, description = "Unknown user", body = ApiErrorBody),
        (status = 500, description = "Id space exhausted", body = ApiErrorBody),
    ),
)]
pub async fn new_brawl_id(
    State(state): State<AppState>,
    Query(params): Query<NewBrawlIdParams>,
) -> Result<String, ApiError> {
    if state.rooms.settings().require_known_users {
        let user_id = params.id.unwrap_or_default();
        if !state.directory.validate_user(&user_id).await? {
            return Err(ApiError::unauthorized(
                "You seem to be an unauthorized user. Refresh the page?",
            ));
        }
    }

    let key = state.rooms.generate_key(&state.names)?;
    tracing::debug!(%key, "allocated brawl id");
    Ok(key)
}
