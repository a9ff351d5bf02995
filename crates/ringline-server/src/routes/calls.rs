//! Call Routes - Placing, inspecting and ending calls

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::{error_response, ApiError};
use crate::application::InitiateCall;
use crate::models::{
    CallDetailResponse, CallResponse, InitiateCallRequest, ListCallsQuery, DEFAULT_LIST_LIMIT,
};
use crate::AppState;

/// Place an outbound call
#[utoipa::path(
    post,
    path = "/ringline/accounts/{account_id}/calls",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    request_body = InitiateCallRequest,
    responses(
        (status = 200, description = "Call placed and ringing", body = CallResponse),
        (status = 400, description = "Invalid phone number"),
        (status = 404, description = "Account not found"),
        (status = 502, description = "Gateway rejected the call"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn initiate_call(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Json(payload): Json<InitiateCallRequest>,
) -> Result<Json<CallResponse>, ApiError> {
    let call = state
        .orchestrator
        .initiate(
            account_id,
            InitiateCall {
                phone_number: payload.phone_number,
                objective: payload.objective,
                model: payload.model,
                voice: payload.voice,
            },
        )
        .await
        .map_err(error_response)?;

    Ok(Json(call.into()))
}

/// List calls, newest first
#[utoipa::path(
    get,
    path = "/ringline/accounts/{account_id}/calls",
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ListCallsQuery
    ),
    responses(
        (status = 200, description = "Calls", body = Vec<CallResponse>),
        (status = 400, description = "Invalid limit"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn list_calls(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
    Query(query): Query<ListCallsQuery>,
) -> Result<Json<Vec<CallResponse>>, ApiError> {
    let calls = state
        .orchestrator
        .list_calls(account_id, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
        .map_err(error_response)?;

    Ok(Json(calls.into_iter().map(Into::into).collect()))
}

/// List calls that have not reached a terminal status
#[utoipa::path(
    get,
    path = "/ringline/accounts/{account_id}/calls/active",
    params(("account_id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Active calls", body = Vec<CallResponse>),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn list_active_calls(
    State(state): State<AppState>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<Vec<CallResponse>>, ApiError> {
    let calls = state
        .orchestrator
        .list_active(account_id)
        .await
        .map_err(error_response)?;

    Ok(Json(calls.into_iter().map(Into::into).collect()))
}

/// Get a call with its audit trail
#[utoipa::path(
    get,
    path = "/ringline/accounts/{account_id}/calls/{call_id}",
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ("call_id" = Uuid, Path, description = "Call ID")
    ),
    responses(
        (status = 200, description = "Call found", body = CallDetailResponse),
        (status = 404, description = "Call not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn get_call(
    State(state): State<AppState>,
    Path((account_id, call_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CallDetailResponse>, ApiError> {
    let (call, events) = state
        .orchestrator
        .get_call(account_id, call_id)
        .await
        .map_err(error_response)?;

    Ok(Json(CallDetailResponse {
        call: call.into(),
        events: events.into_iter().map(Into::into).collect(),
    }))
}

/// Hang up a call
#[utoipa::path(
    post,
    path = "/ringline/accounts/{account_id}/calls/{call_id}/end",
    params(
        ("account_id" = Uuid, Path, description = "Account ID"),
        ("call_id" = Uuid, Path, description = "Call ID")
    ),
    responses(
        (status = 200, description = "Call ended (or already finished)", body = CallResponse),
        (status = 404, description = "Call not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Call"
)]
pub async fn end_call(
    State(state): State<AppState>,
    Path((account_id, call_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CallResponse>, ApiError> {
    let call = state
        .orchestrator
        .end_call(account_id, call_id)
        .await
        .map_err(error_response)?;

    Ok(Json(call.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/ringline/accounts/:account_id/calls",
            get(list_calls).post(initiate_call),
        )
        .route(
            "/ringline/accounts/:account_id/calls/active",
            get(list_active_calls),
        )
        .route("/ringline/accounts/:account_id/calls/:call_id", get(get_call))
        .route(
            "/ringline/accounts/:account_id/calls/:call_id/end",
            post(end_call),
        )
}
