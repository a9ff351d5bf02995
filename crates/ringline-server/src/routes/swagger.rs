//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa. Gateway callbacks are left
//! out; they speak the gateway's markup, not JSON.

use utoipa::OpenApi;

use crate::models::{
    AccountResponse, CallDetailResponse, CallEventResponse, CallResponse, CallStatsResponse,
    CallTurnResponse, CreateAccountRequest, InitiateCallRequest, LanguageModelCheckResponse,
    OriginNumberResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Account endpoints
        super::accounts::create_account,
        super::accounts::get_account,
        super::accounts::get_stats,
        // Call endpoints
        super::calls::initiate_call,
        super::calls::list_calls,
        super::calls::list_active_calls,
        super::calls::get_call,
        super::calls::end_call,
        // Number endpoints
        super::numbers::list_numbers,
        // Diagnostics
        super::diagnostics::check_language_model,
    ),
    info(
        title = "Ringline API",
        version = "0.1.0",
        description = "Outbound AI voice calls: placement, live conversation, audit trail and usage billing.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Account", description = "Account - Call owners, credit balance and analytics"),
        (name = "Call", description = "Call - Outbound conversations and their audit trail"),
        (name = "Numbers", description = "Numbers - Origin numbers on the telephony gateway"),
        (name = "Diagnostics", description = "Diagnostics - Connectivity checks against remote services"),
    ),
    components(
        schemas(
            // Account
            CreateAccountRequest,
            AccountResponse,
            CallStatsResponse,
            // Call
            InitiateCallRequest,
            CallTurnResponse,
            CallResponse,
            CallEventResponse,
            CallDetailResponse,
            // Numbers
            OriginNumberResponse,
            // Diagnostics
            LanguageModelCheckResponse,
        )
    ),
)]
pub struct ApiDoc;
