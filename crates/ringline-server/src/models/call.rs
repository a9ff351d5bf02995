//! Call DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use ringline::{Call, CallEvent, CallTurn, OriginNumber};

use crate::application::CallStats;

pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Initiate call request
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiateCallRequest {
    /// Destination, e.g. "+1 (555) 123-4567"
    pub phone_number: String,
    /// What the agent should accomplish (default: "General inquiry call")
    pub objective: Option<String>,
    /// Language model selector (default: "gpt-4o")
    pub model: Option<String>,
    /// Voice selector (default: "alloy"). Used for speech when the gateway
    /// offers that voice, otherwise only recorded
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListCallsQuery {
    /// Maximum calls to return, newest first (default 50)
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallTurnResponse {
    /// "user" or "assistant"
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl From<CallTurn> for CallTurnResponse {
    fn from(turn: CallTurn) -> Self {
        Self {
            role: match turn.role {
                ringline::TurnRole::User => "user".to_string(),
                ringline::TurnRole::Assistant => "assistant".to_string(),
            },
            content: turn.content,
            timestamp: turn.timestamp,
        }
    }
}

/// Call record
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub phone_number: String,
    pub gateway_call_ref: Option<String>,
    /// initiated | ringing | in-progress | completed | failed | busy | no-answer | cancelled
    pub status: String,
    pub duration_secs: i32,
    pub model: String,
    pub voice: String,
    pub objective: String,
    pub conversation: Vec<CallTurnResponse>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub credits_charged: i32,
    pub billed_at: Option<DateTime<Utc>>,
}

impl From<Call> for CallResponse {
    fn from(call: Call) -> Self {
        Self {
            id: call.id,
            owner_id: call.owner_id,
            phone_number: call.phone_number,
            gateway_call_ref: call.gateway_call_ref,
            status: call.status.to_string(),
            duration_secs: call.duration_secs,
            model: call.model,
            voice: call.voice,
            objective: call.objective,
            conversation: call.conversation.into_iter().map(Into::into).collect(),
            started_at: call.started_at,
            ended_at: call.ended_at,
            credits_charged: call.credits_charged,
            billed_at: call.billed_at,
        }
    }
}

/// Audit event
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallEventResponse {
    pub id: Uuid,
    /// Event kind, e.g. "call_answered", "ai_response", "status_update"
    pub kind: String,
    /// Kind-specific payload
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<CallEvent> for CallEventResponse {
    fn from(event: CallEvent) -> Self {
        let data = serde_json::to_value(&event.event)
            .ok()
            .and_then(|mut v| v.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null);

        Self {
            id: event.id,
            kind: event.kind().to_string(),
            data,
            created_at: event.created_at,
        }
    }
}

/// Call with its ordered audit trail
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallDetailResponse {
    pub call: CallResponse,
    pub events: Vec<CallEventResponse>,
}

/// Account call analytics
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CallStatsResponse {
    pub total_calls: usize,
    pub active_calls: usize,
    /// Percentage of calls that completed, one decimal
    pub success_rate: f64,
    pub credits_used: i64,
}

impl From<CallStats> for CallStatsResponse {
    fn from(stats: CallStats) -> Self {
        Self {
            total_calls: stats.total_calls,
            active_calls: stats.active_calls,
            success_rate: stats.success_rate,
            credits_used: stats.credits_used,
        }
    }
}

/// Origin number owned on the gateway
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OriginNumberResponse {
    pub phone_number: String,
    pub friendly_name: String,
}

impl From<OriginNumber> for OriginNumberResponse {
    fn from(number: OriginNumber) -> Self {
        Self {
            phone_number: number.phone_number,
            friendly_name: number.friendly_name,
        }
    }
}
