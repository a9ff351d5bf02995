//! Number Routes - Origin numbers available on the gateway

use axum::{extract::State, routing::get, Json, Router};

use super::{error_response, ApiError};
use crate::models::OriginNumberResponse;
use crate::AppState;

/// List origin numbers owned on the telephony gateway
#[utoipa::path(
    get,
    path = "/ringline/numbers",
    responses(
        (status = 200, description = "Origin numbers", body = Vec<OriginNumberResponse>),
        (status = 502, description = "Gateway unavailable")
    ),
    tag = "Numbers"
)]
pub async fn list_numbers(
    State(state): State<AppState>,
) -> Result<Json<Vec<OriginNumberResponse>>, ApiError> {
    let numbers = state
        .orchestrator
        .list_numbers()
        .await
        .map_err(error_response)?;

    Ok(Json(numbers.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ringline/numbers", get(list_numbers))
}
