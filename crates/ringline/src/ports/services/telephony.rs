//! Telephony Gateway Port
//!
//! Remote call control: place and terminate calls, list origin numbers, and
//! render voice response documents into the gateway's markup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::services::voice_response::VoiceResponse;

/// Request to place an outbound call
#[derive(Debug, Clone)]
pub struct PlaceCall {
    /// Destination number (normalized)
    pub to: String,
    /// Origin number; gateways use their configured default when absent
    pub from: Option<String>,
    /// Fetched by the gateway when the destination answers
    pub connected_url: String,
    /// Receives status changes (ringing, completed, busy, ...)
    pub status_url: String,
}

/// Gateway acknowledgement of a placed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedCall {
    pub gateway_ref: String,
    /// Status as reported by the gateway at placement time
    pub status: String,
}

/// An origin number owned on the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginNumber {
    pub phone_number: String,
    pub friendly_name: String,
}

#[async_trait]
pub trait TelephonyGateway: Send + Sync {
    /// Ask the gateway to dial out
    async fn place_call(&self, request: &PlaceCall) -> Result<PlacedCall, DomainError>;

    /// Terminate an in-flight call by gateway reference
    async fn end_call(&self, gateway_ref: &str) -> Result<(), DomainError>;

    /// Origin numbers available for placing calls
    async fn list_numbers(&self) -> Result<Vec<OriginNumber>, DomainError>;

    /// Render a response document into the gateway's wire format
    fn render(&self, response: &VoiceResponse) -> String;

    /// MIME type of rendered documents
    fn content_type(&self) -> &'static str;

    /// Gateway name (e.g., "twilio")
    fn name(&self) -> &str;
}
