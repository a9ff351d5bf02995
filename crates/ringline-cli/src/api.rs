//! Ringline API Client

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API Client for Ringline
pub struct RinglineClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

// ============================================
// API Response Types
// ============================================

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub name: String,
    pub credits: i32,
}

#[derive(Debug, Deserialize)]
pub struct CallTurnResponse {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CallResponse {
    pub id: Uuid,
    pub phone_number: String,
    pub status: String,
    pub duration_secs: i32,
    pub objective: String,
    pub conversation: Vec<CallTurnResponse>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub credits_charged: i32,
}

#[derive(Debug, Deserialize)]
pub struct CallEventResponse {
    pub kind: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CallDetailResponse {
    pub call: CallResponse,
    pub events: Vec<CallEventResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CallStatsResponse {
    pub total_calls: usize,
    pub active_calls: usize,
    pub success_rate: f64,
    pub credits_used: i64,
}

#[derive(Debug, Deserialize)]
pub struct OriginNumberResponse {
    pub phone_number: String,
    pub friendly_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LanguageModelCheckResponse {
    pub provider: String,
    pub model: String,
    pub test_response: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<i32>,
}

#[derive(Debug, Default, Serialize)]
pub struct InitiateCallRequest {
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl RinglineClient {
    /// Create a new API client
    pub fn new(base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(|k| k.to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach auth, send, and decode a successful JSON reply
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        };

        let resp = request
            .send()
            .await
            .context("Failed to connect to Ringline API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("API error ({}): {}", status, body);
        }

        resp.json().await.context("Failed to parse response")
    }

    /// Test connection with health check
    pub async fn health(&self) -> Result<bool> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Ok(resp.status().is_success())
    }

    /// Cheap authenticated request, used to validate an API key
    pub async fn list_numbers(&self) -> Result<Vec<OriginNumberResponse>> {
        self.send(self.client.get(self.url("/ringline/numbers")))
            .await
    }

    pub async fn check_language_model(&self) -> Result<LanguageModelCheckResponse> {
        self.send(self.client.get(self.url("/ringline/diagnostics/llm")))
            .await
    }

    // ============================================
    // Accounts
    // ============================================

    pub async fn create_account(&self, name: &str, credits: Option<i32>) -> Result<AccountResponse> {
        let request = CreateAccountRequest {
            name: name.to_string(),
            credits,
        };
        self.send(self.client.post(self.url("/ringline/accounts")).json(&request))
            .await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<AccountResponse> {
        self.send(
            self.client
                .get(self.url(&format!("/ringline/accounts/{}", account_id))),
        )
        .await
    }

    pub async fn get_stats(&self, account_id: &str) -> Result<CallStatsResponse> {
        self.send(
            self.client
                .get(self.url(&format!("/ringline/accounts/{}/stats", account_id))),
        )
        .await
    }

    // ============================================
    // Calls
    // ============================================

    pub async fn initiate_call(
        &self,
        account_id: &str,
        request: &InitiateCallRequest,
    ) -> Result<CallResponse> {
        self.send(
            self.client
                .post(self.url(&format!("/ringline/accounts/{}/calls", account_id)))
                .json(request),
        )
        .await
    }

    pub async fn list_calls(&self, account_id: &str, limit: i64) -> Result<Vec<CallResponse>> {
        self.send(
            self.client
                .get(self.url(&format!("/ringline/accounts/{}/calls", account_id)))
                .query(&[("limit", limit)]),
        )
        .await
    }

    pub async fn list_active_calls(&self, account_id: &str) -> Result<Vec<CallResponse>> {
        self.send(
            self.client
                .get(self.url(&format!("/ringline/accounts/{}/calls/active", account_id))),
        )
        .await
    }

    pub async fn get_call(&self, account_id: &str, call_id: &str) -> Result<CallDetailResponse> {
        self.send(self.client.get(self.url(&format!(
            "/ringline/accounts/{}/calls/{}",
            account_id, call_id
        ))))
        .await
    }

    pub async fn end_call(&self, account_id: &str, call_id: &str) -> Result<CallResponse> {
        self.send(self.client.post(self.url(&format!(
            "/ringline/accounts/{}/calls/{}/end",
            account_id, call_id
        ))))
        .await
    }
}
