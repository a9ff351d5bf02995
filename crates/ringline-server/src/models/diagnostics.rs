//! Diagnostics models

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use ringline::ProviderCheck;

/// Result of a live round trip to the language provider
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LanguageModelCheckResponse {
    pub provider: String,
    pub model: String,
    /// Opening line generated for a throwaway "Test call" objective
    pub test_response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
}

impl From<ProviderCheck> for LanguageModelCheckResponse {
    fn from(check: ProviderCheck) -> Self {
        Self {
            provider: check.provider,
            model: check.model,
            test_response: check.reply,
            prompt_tokens: check.usage.prompt_tokens,
            completion_tokens: check.usage.completion_tokens,
            finish_reason: check.finish_reason,
            latency_ms: check.latency_ms,
        }
    }
}
