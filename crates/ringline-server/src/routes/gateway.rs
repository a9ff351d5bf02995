//! Gateway Callback Routes
//!
//! Endpoints the telephony gateway calls while a call is live. They sit
//! outside bearer auth and always answer with a voice response document in
//! the gateway's markup, even when the request is malformed or refused.

use axum::{
    extract::{
        rejection::{FormRejection, PathRejection, QueryRejection},
        Form, Path, Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

use ringline::VoiceResponse;

use crate::application::StatusReport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Fields the gateway posts with each callback (all optional)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatewayCallbackForm {
    pub call_sid: Option<String>,
    pub call_status: Option<String>,
    pub call_duration: Option<String>,
    pub speech_result: Option<String>,
    pub digits: Option<String>,
}

impl GatewayCallbackForm {
    /// Transcribed speech, else keypad digits, else empty
    fn utterance(&self) -> String {
        self.speech_result
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| self.digits.as_deref().map(str::trim))
            .unwrap_or_default()
            .to_string()
    }

    fn status_report(self) -> StatusReport {
        StatusReport {
            status: self.call_status,
            duration_secs: self
                .call_duration
                .and_then(|d| d.trim().parse::<i32>().ok()),
        }
    }
}

fn document(state: &AppState, response: &VoiceResponse) -> Response {
    (
        [(header::CONTENT_TYPE, state.gateway.content_type())],
        state.gateway.render(response),
    )
        .into_response()
}

/// Resolve the call id and check the callback token.
/// `Err` carries the document to send back instead of handling the callback.
fn authorize(
    state: &AppState,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Result<Uuid, VoiceResponse> {
    let Path(call_id) = path.map_err(|e| {
        tracing::warn!(error = %e, "Callback with malformed call id");
        VoiceResponse::apology_hangup()
    })?;

    let token = query.ok().and_then(|Query(q)| q.token);
    if !state.signer.verify(call_id, token.as_deref()) {
        tracing::warn!(call_id = %call_id, "Callback with missing or invalid token");
        return Err(VoiceResponse::hangup());
    }

    Ok(call_id)
}

/// Destination answered: speak the opening line and listen
pub async fn connected(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<TokenQuery>, QueryRejection>,
) -> Response {
    let response = match authorize(&state, path, query) {
        Ok(call_id) => state.orchestrator.on_connected(call_id).await,
        Err(refusal) => refusal,
    };
    document(&state, &response)
}

/// Speech gathered: consult the agent and reply
pub async fn gather(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    form: Result<Form<GatewayCallbackForm>, FormRejection>,
) -> Response {
    let call_id = match authorize(&state, path, query) {
        Ok(call_id) => call_id,
        Err(refusal) => return document(&state, &refusal),
    };

    let response = match form {
        Ok(Form(form)) => {
            tracing::debug!(call_id = %call_id, call_sid = ?form.call_sid, "Speech gathered");
            state
                .orchestrator
                .on_speech(call_id, &form.utterance())
                .await
        }
        Err(e) => {
            tracing::warn!(call_id = %call_id, error = %e, "Unreadable speech callback body");
            VoiceResponse::apology_hangup()
        }
    };
    document(&state, &response)
}

/// Status change: record it and settle usage when a duration is reported
pub async fn status(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    form: Result<Form<GatewayCallbackForm>, FormRejection>,
) -> Response {
    let call_id = match authorize(&state, path, query) {
        Ok(call_id) => call_id,
        Err(refusal) => return document(&state, &refusal),
    };

    let response = match form {
        Ok(Form(form)) => {
            state
                .orchestrator
                .on_status(call_id, form.status_report())
                .await
        }
        Err(e) => {
            tracing::warn!(call_id = %call_id, error = %e, "Unreadable status callback body");
            VoiceResponse::empty()
        }
    };
    document(&state, &response)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ringline/gateway/calls/:call_id/connected", post(connected))
        .route("/ringline/gateway/calls/:call_id/gather", post(gather))
        .route("/ringline/gateway/calls/:call_id/status", post(status))
}
