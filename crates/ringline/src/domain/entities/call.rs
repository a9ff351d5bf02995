//! Call - One outbound conversation session
//!
//! Pure domain entity without infrastructure dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::services::lifecycle::{self, CallTrigger, Transition, TransitionError};
use crate::domain::value_objects::{CallStatus, PhoneNumber};

pub const DEFAULT_OBJECTIVE: &str = "General inquiry call";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_VOICE: &str = "alloy";

/// Who spoke a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One utterance in the call transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Call - Outbound phone conversation and its billing record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub phone_number: String,
    /// Gateway-side reference, set once the gateway accepts the call
    pub gateway_call_ref: Option<String>,
    pub status: CallStatus,
    pub duration_secs: i32,
    pub model: String,
    pub voice: String,
    pub objective: String,
    /// Append-only transcript
    pub conversation: Vec<CallTurn>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub credits_charged: i32,
    /// Set once usage has been charged; guards against double billing
    pub billed_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter maintained by the repository
    pub version: i32,
}

impl Call {
    /// Create a new call in the `initiated` state
    pub fn new(
        owner_id: Uuid,
        phone_number: PhoneNumber,
        objective: Option<String>,
        model: Option<String>,
        voice: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            phone_number: phone_number.into(),
            gateway_call_ref: None,
            status: CallStatus::Initiated,
            duration_secs: 0,
            model: non_blank(model).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: non_blank(voice).unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            objective: non_blank(objective).unwrap_or_else(|| DEFAULT_OBJECTIVE.to_string()),
            conversation: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
            credits_charged: 0,
            billed_at: None,
            version: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_billed(&self) -> bool {
        self.billed_at.is_some()
    }

    /// Drive the lifecycle state machine.
    ///
    /// Entering a terminal status stamps `ended_at` if it is not already set.
    pub fn apply(&mut self, trigger: CallTrigger) -> Result<Transition, TransitionError> {
        let transition = lifecycle::transition(self.status, trigger)?;
        if let Transition::Moved { to, .. } = transition {
            self.status = to;
            if to.is_terminal() {
                self.mark_ended();
            }
        }
        Ok(transition)
    }

    /// Stamp `ended_at` once
    pub fn mark_ended(&mut self) {
        if self.ended_at.is_none() {
            self.ended_at = Some(Utc::now());
        }
    }

    pub fn push_turn(&mut self, role: TurnRole, content: impl Into<String>) {
        self.conversation.push(CallTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
    }

    /// First assistant line spoken after the call was answered
    pub fn opening_line(&self) -> Option<&str> {
        self.conversation
            .first()
            .filter(|turn| turn.role == TurnRole::Assistant)
            .map(|turn| turn.content.as_str())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_call() -> Call {
        Call::new(
            Uuid::new_v4(),
            PhoneNumber::parse("+15551234567").unwrap(),
            Some("Book an appointment for 5pm".to_string()),
            None,
            None,
        )
    }

    #[test]
    fn test_new_call_defaults() {
        let call = Call::new(
            Uuid::new_v4(),
            PhoneNumber::parse("+15551234567").unwrap(),
            Some("   ".to_string()),
            None,
            Some(String::new()),
        );
        assert_eq!(call.status, CallStatus::Initiated);
        assert_eq!(call.objective, DEFAULT_OBJECTIVE);
        assert_eq!(call.model, DEFAULT_MODEL);
        assert_eq!(call.voice, DEFAULT_VOICE);
        assert_eq!(call.credits_charged, 0);
        assert!(call.ended_at.is_none());
    }

    #[test]
    fn test_terminal_transition_stamps_ended_at_once() {
        let mut call = new_call();
        call.apply(CallTrigger::GatewayAccepted).unwrap();
        call.apply(CallTrigger::Answered).unwrap();
        call.apply(CallTrigger::ConversationEnded).unwrap();
        let ended = call.ended_at.expect("ended_at set");

        assert!(call.apply(CallTrigger::Answered).is_err());
        assert_eq!(call.status, CallStatus::Completed);
        assert_eq!(call.ended_at, Some(ended));
    }

    #[test]
    fn test_opening_line_is_first_assistant_turn() {
        let mut call = new_call();
        assert!(call.opening_line().is_none());
        call.push_turn(TurnRole::Assistant, "Hi, I'm calling about your booking.");
        call.push_turn(TurnRole::User, "Sure");
        assert_eq!(
            call.opening_line(),
            Some("Hi, I'm calling about your booking.")
        );
    }
}
