//! Account Routes - Call owners, balances and analytics

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{error_response, ApiError};
use crate::models::{AccountResponse, CallStatsResponse, CreateAccountRequest};
use crate::AppState;

/// Create account
#[utoipa::path(
    post,
    path = "/ringline/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 200, description = "Account created", body = AccountResponse),
        (status = 400, description = "Invalid name or credits"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Account"
)]
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .account_service
        .create(payload.name, payload.credits)
        .await
        .map_err(error_response)?;

    Ok(Json(account.into()))
}

/// Get account with current credit balance
#[utoipa::path(
    get,
    path = "/ringline/accounts/{account_id}",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account found", body = AccountResponse),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Account"
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account = state
        .account_service
        .get_by_id(account_id)
        .await
        .map_err(error_response)?;

    Ok(Json(account.into()))
}

/// Call analytics for an account
#[utoipa::path(
    get,
    path = "/ringline/accounts/{account_id}/stats",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Call analytics", body = CallStatsResponse),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Account"
)]
pub async fn get_stats(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<CallStatsResponse>, ApiError> {
    let stats = state
        .orchestrator
        .stats(account_id)
        .await
        .map_err(error_response)?;

    Ok(Json(stats.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ringline/accounts", post(create_account))
        .route("/ringline/accounts/:account_id", get(get_account))
        .route("/ringline/accounts/:account_id/stats", get(get_stats))
}
