//! Bearer API key authentication for the application API
//!
//! Gateway callbacks are not behind this layer; they carry a signed token
//! instead (see `services::callback_signer`).

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

static API_KEY: std::sync::OnceLock<String> = std::sync::OnceLock::new();

/// Install the API key; later calls are ignored
pub fn init_api_key(key: String) {
    let _ = API_KEY.set(key);
}

fn configured_key() -> Option<&'static str> {
    API_KEY.get().map(String::as_str).filter(|key| !key.is_empty())
}

/// Accepts `Authorization: Bearer <RINGLINE_API_KEY>`.
///
/// With no key configured every request passes (local development).
pub async fn auth_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(api_key) = configured_key() else {
        tracing::debug!("No API key configured, skipping authentication");
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").ok_or("malformed"))
        .unwrap_or(Err("missing"));

    match token {
        Ok(token) if token == api_key => Ok(next.run(request).await),
        Ok(_) => {
            tracing::warn!(path = %request.uri().path(), "Invalid API key attempted");
            Err(StatusCode::UNAUTHORIZED)
        }
        Err(reason) => {
            tracing::warn!(path = %request.uri().path(), reason, "Rejected Authorization header");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
