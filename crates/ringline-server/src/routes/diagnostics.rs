//! Diagnostics Routes - Connectivity checks for operators

use axum::{extract::State, routing::get, Json, Router};

use super::{error_response, ApiError};
use crate::models::LanguageModelCheckResponse;
use crate::AppState;

/// Generate one opening line to confirm the language provider answers
#[utoipa::path(
    get,
    path = "/ringline/diagnostics/llm",
    responses(
        (status = 200, description = "Provider reachable", body = LanguageModelCheckResponse),
        (status = 502, description = "Provider failed or timed out")
    ),
    tag = "Diagnostics"
)]
pub async fn check_language_model(
    State(state): State<AppState>,
) -> Result<Json<LanguageModelCheckResponse>, ApiError> {
    let check = state
        .orchestrator
        .check_language_model()
        .await
        .map_err(error_response)?;

    Ok(Json(check.into()))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ringline/diagnostics/llm", get(check_language_model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ScriptedGateway, ScriptedProvider};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get_check(harness: &Harness) -> (StatusCode, Vec<u8>) {
        let response = crate::build_router(harness.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/ringline/diagnostics/llm")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_reachable_provider() {
        let h = Harness::new().await;
        let (status, body) = get_check(&h).await;
        assert_eq!(status, StatusCode::OK);

        let check: LanguageModelCheckResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(check.provider, "scripted");
        assert_eq!(
            check.test_response,
            "Hi, this is Ringline calling about your appointment."
        );
        assert_eq!(check.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn test_failing_provider_is_bad_gateway() {
        let h = Harness::with(ScriptedGateway::default(), ScriptedProvider::failing()).await;
        let (status, body) = get_check(&h).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(String::from_utf8(body).unwrap().contains("provider down"));
    }
}
