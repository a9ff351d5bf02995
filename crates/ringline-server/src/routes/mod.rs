//! Ringline API Routes
//!
//! - /ringline/accounts - Account management and analytics
//! - /ringline/accounts/:account_id/calls - Call placement, listing, termination
//! - /ringline/numbers - Gateway origin numbers
//! - /ringline/diagnostics/llm - Language provider connectivity check
//! - /ringline/gateway/calls/:call_id/* - Telephony gateway callbacks (signed, no bearer auth)

use axum::http::StatusCode;

use ringline::DomainError;

pub mod accounts;
pub mod calls;
pub mod diagnostics;
pub mod gateway;
pub mod numbers;
pub mod swagger;

/// Error shape shared by every JSON route
pub type ApiError = (StatusCode, String);

/// Map a domain error onto an HTTP status
pub fn error_response(e: DomainError) -> ApiError {
    let status = match &e {
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Validation(_) => StatusCode::BAD_REQUEST,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
        DomainError::ExternalService(_) | DomainError::Timeout { .. } => StatusCode::BAD_GATEWAY,
        DomainError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!(error = %e, "Request failed");
    }

    (status, e.to_string())
}
