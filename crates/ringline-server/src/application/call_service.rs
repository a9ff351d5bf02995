//! Call Orchestrator (Use Case)
//!
//! Owns the call lifecycle: placing calls, reacting to gateway callbacks,
//! consulting the conversation agent and keeping the call record and its
//! audit trail in step. Every mutation of a call happens under that call's
//! guard from `CallLocks`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use ringline::domain::services::agent::DEFAULT_OPENING;
use ringline::domain::services::OPENING_PROMPT;
use ringline::{
    AccountRepository, Call, CallEvent, CallEventKind, CallRepository, CallStatus, CallTrigger,
    CallbackKind, ConversationAgent, DomainError, OriginNumber, PhoneNumber, PlaceCall,
    ProviderCheck, TelephonyGateway, TurnRole, VoiceResponse,
};

use super::locks::CallLocks;
use super::usage::UsageAccountant;
use crate::services::CallbackSigner;

const MAX_LIST_LIMIT: i64 = 500;

/// Owner request to place a call
#[derive(Debug, Clone, Default)]
pub struct InitiateCall {
    pub phone_number: String,
    pub objective: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
}

/// Parsed status callback
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    pub status: Option<String>,
    pub duration_secs: Option<i32>,
}

/// Per-account call analytics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallStats {
    pub total_calls: usize,
    pub active_calls: usize,
    /// Completed calls as a percentage of all calls, one decimal
    pub success_rate: f64,
    pub credits_used: i64,
}

impl CallStats {
    pub fn from_calls(calls: &[Call]) -> Self {
        let total = calls.len();
        let active = calls.iter().filter(|c| !c.is_terminal()).count();
        let completed = calls
            .iter()
            .filter(|c| c.status == CallStatus::Completed)
            .count();
        let success_rate = if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64 * 1000.0).round() / 10.0
        };

        Self {
            total_calls: total,
            active_calls: active,
            success_rate,
            credits_used: calls.iter().map(|c| i64::from(c.credits_charged)).sum(),
        }
    }
}

pub struct CallOrchestrator {
    calls: Arc<dyn CallRepository>,
    accounts: Arc<dyn AccountRepository>,
    gateway: Arc<dyn TelephonyGateway>,
    agent: ConversationAgent,
    accountant: UsageAccountant,
    signer: Arc<CallbackSigner>,
    locks: CallLocks,
    gateway_timeout: Duration,
}

impl CallOrchestrator {
    pub fn new(
        calls: Arc<dyn CallRepository>,
        accounts: Arc<dyn AccountRepository>,
        gateway: Arc<dyn TelephonyGateway>,
        agent: ConversationAgent,
        signer: Arc<CallbackSigner>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            accountant: UsageAccountant::new(calls.clone()),
            calls,
            accounts,
            gateway,
            agent,
            signer,
            locks: CallLocks::new(),
            gateway_timeout,
        }
    }

    // =========================================================================
    // Owner operations
    // =========================================================================

    /// Create a call and ask the gateway to dial it.
    ///
    /// On gateway rejection the call is kept as `failed` with a `call_failed`
    /// event and the error is returned.
    pub async fn initiate(&self, owner_id: Uuid, request: InitiateCall) -> Result<Call, DomainError> {
        let phone_number = PhoneNumber::parse(&request.phone_number)?;
        self.require_account(owner_id).await?;

        let call = Call::new(
            owner_id,
            phone_number,
            request.objective,
            request.model,
            request.voice,
        );
        let _guard = self.locks.acquire(call.id).await;
        let mut call = self.calls.insert(&call).await?;

        tracing::info!(call_id = %call.id, to = %call.phone_number, objective = %call.objective, "Initiating call");

        let placement = PlaceCall {
            to: call.phone_number.clone(),
            from: None,
            connected_url: self.signer.connected_url(call.id),
            status_url: self.signer.status_url(call.id),
        };

        let (opening, placed) = tokio::join!(
            self.agent.opening_line(&call.objective, &call.model),
            self.bounded("placing call", self.gateway.place_call(&placement)),
        );

        match placed {
            Ok(placed) => {
                call.apply(CallTrigger::GatewayAccepted)?;
                call.gateway_call_ref = Some(placed.gateway_ref);
                let call = self.calls.update(&call).await?;
                self.record(
                    call.id,
                    CallEventKind::AiMessagePrepared {
                        message: opening.line,
                    },
                )
                .await?;

                tracing::info!(
                    call_id = %call.id,
                    gateway_ref = ?call.gateway_call_ref,
                    gateway_status = %placed.status,
                    "Call placed"
                );
                Ok(call)
            }
            Err(e) => {
                tracing::error!(call_id = %call.id, error = %e, "Gateway rejected call");
                call.apply(CallTrigger::GatewayRejected)?;
                let call = self.calls.update(&call).await?;
                self.record(
                    call.id,
                    CallEventKind::CallFailed {
                        error: e.to_string(),
                    },
                )
                .await?;
                Err(DomainError::ExternalService(format!(
                    "Failed to place call {}: {e}",
                    call.id
                )))
            }
        }
    }

    /// Hang up an owner's call. Already-terminal calls are returned unchanged.
    pub async fn end_call(&self, owner_id: Uuid, call_id: Uuid) -> Result<Call, DomainError> {
        let _guard = self.locks.acquire(call_id).await;
        let mut call = self.owned_call(owner_id, call_id).await?;

        if call.is_terminal() {
            tracing::info!(call_id = %call.id, status = %call.status, "End requested for finished call");
            return Ok(call);
        }

        let gateway_error = match call.gateway_call_ref.as_deref() {
            Some(gateway_ref) => match self
                .bounded("ending call", self.gateway.end_call(gateway_ref))
                .await
            {
                Ok(()) => None,
                Err(e) => {
                    tracing::error!(call_id = %call.id, error = %e, "Gateway failed to end call");
                    Some(e.to_string())
                }
            },
            None => None,
        };

        call.apply(CallTrigger::EndedByUser)?;
        let call = self.calls.update(&call).await?;
        self.record(call.id, CallEventKind::CallEndedByUser { gateway_error })
            .await?;

        tracing::info!(call_id = %call.id, "Call ended by owner");
        Ok(call)
    }

    pub async fn list_calls(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Call>, DomainError> {
        if limit < 1 {
            return Err(DomainError::Validation(
                "limit must be a positive number".to_string(),
            ));
        }
        self.require_account(owner_id).await?;
        self.calls
            .find_by_owner(owner_id, limit.min(MAX_LIST_LIMIT))
            .await
    }

    pub async fn list_active(&self, owner_id: Uuid) -> Result<Vec<Call>, DomainError> {
        self.require_account(owner_id).await?;
        self.calls.find_active(owner_id).await
    }

    /// A call with its audit trail, oldest event first
    pub async fn get_call(
        &self,
        owner_id: Uuid,
        call_id: Uuid,
    ) -> Result<(Call, Vec<CallEvent>), DomainError> {
        let call = self.owned_call(owner_id, call_id).await?;
        let events = self.calls.find_events(call.id).await?;
        Ok((call, events))
    }

    pub async fn stats(&self, owner_id: Uuid) -> Result<CallStats, DomainError> {
        self.require_account(owner_id).await?;
        let calls = self.calls.find_by_owner(owner_id, i64::MAX).await?;
        Ok(CallStats::from_calls(&calls))
    }

    pub async fn list_numbers(&self) -> Result<Vec<OriginNumber>, DomainError> {
        self.bounded("listing numbers", self.gateway.list_numbers())
            .await
    }

    /// Round trip to the language provider, outside any call
    pub async fn check_language_model(&self) -> Result<ProviderCheck, DomainError> {
        let check = self.agent.check().await?;
        tracing::info!(
            provider = %check.provider,
            model = %check.model,
            latency_ms = check.latency_ms,
            total_tokens = check.usage.total_tokens,
            "Language provider reachable"
        );
        Ok(check)
    }

    // =========================================================================
    // Gateway callbacks
    //
    // These never fail outward: the gateway always gets a document back, and
    // the failure is kept as a `callback_failed` event when the log accepts it.
    // =========================================================================

    /// Destination answered
    pub async fn on_connected(&self, call_id: Uuid) -> VoiceResponse {
        match self.connected(call_id).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "Connected callback failed");
                self.record_failure(call_id, CallbackKind::Connected, &e).await;
                VoiceResponse::apology_hangup()
            }
        }
    }

    /// Speech (or silence) gathered from the callee
    pub async fn on_speech(&self, call_id: Uuid, utterance: &str) -> VoiceResponse {
        match self.speech(call_id, utterance).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "Speech callback failed");
                self.record_failure(call_id, CallbackKind::SpeechGathered, &e)
                    .await;
                VoiceResponse::apology_hangup()
            }
        }
    }

    /// Status change reported by the gateway
    pub async fn on_status(&self, call_id: Uuid, report: StatusReport) -> VoiceResponse {
        match self.status(call_id, report).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "Status callback failed");
                self.record_failure(call_id, CallbackKind::Status, &e).await;
                VoiceResponse::empty()
            }
        }
    }

    async fn connected(&self, call_id: Uuid) -> Result<VoiceResponse, DomainError> {
        let _guard = self.locks.acquire(call_id).await;
        let Some(mut call) = self.calls.find_by_id(call_id).await? else {
            tracing::warn!(call_id = %call_id, "Connected callback for unknown call");
            return Ok(VoiceResponse::hangup());
        };

        if call.is_terminal() {
            self.ignore(&call, CallbackKind::Connected).await?;
            return Ok(VoiceResponse::hangup());
        }

        if call.status == CallStatus::InProgress {
            self.ignore(&call, CallbackKind::Connected).await?;
            let line = call.opening_line().unwrap_or(DEFAULT_OPENING);
            return Ok(
                VoiceResponse::speak_then_listen(line, &self.signer.gather_url(call.id))
                    .with_prompt(OPENING_PROMPT)
                    .in_voice(call.voice.clone()),
            );
        }

        call.apply(CallTrigger::Answered)?;
        let opening = self.agent.opening_line(&call.objective, &call.model).await;
        call.push_turn(TurnRole::Assistant, opening.line.clone());
        let call = self.calls.update(&call).await?;

        self.record(
            call.id,
            CallEventKind::CallAnswered {
                opening_line: opening.line.clone(),
                fallback: opening.fallback,
            },
        )
        .await?;

        tracing::info!(call_id = %call.id, fallback = opening.fallback, "Call answered");
        Ok(
            VoiceResponse::speak_then_listen(opening.line, &self.signer.gather_url(call.id))
                .with_prompt(OPENING_PROMPT)
                .in_voice(call.voice.clone()),
        )
    }

    async fn speech(&self, call_id: Uuid, utterance: &str) -> Result<VoiceResponse, DomainError> {
        let _guard = self.locks.acquire(call_id).await;
        let Some(mut call) = self.calls.find_by_id(call_id).await? else {
            tracing::warn!(call_id = %call_id, "Speech callback for unknown call");
            return Ok(VoiceResponse::hangup());
        };

        if call.is_terminal() {
            self.ignore(&call, CallbackKind::SpeechGathered).await?;
            return Ok(VoiceResponse::hangup());
        }

        // Speech can beat the connected callback; hearing the callee means answered.
        call.apply(CallTrigger::Answered)?;

        let history = call.conversation.clone();
        call.push_turn(TurnRole::User, utterance);

        let decision = self
            .agent
            .respond(&history, &call.objective, utterance, &call.model)
            .await;
        call.push_turn(TurnRole::Assistant, decision.message.clone());

        let response = if decision.keeps_listening() {
            VoiceResponse::speak_then_listen(&decision.message, &self.signer.gather_url(call.id))
        } else {
            call.apply(CallTrigger::ConversationEnded)?;
            VoiceResponse::speak_then_hangup(&decision.message)
        }
        .in_voice(call.voice.clone());

        // Save first: events only describe stored turns
        let call = self.calls.update(&call).await?;
        self.record(
            call.id,
            CallEventKind::UserInput {
                speech: utterance.to_string(),
            },
        )
        .await?;
        self.record(
            call.id,
            CallEventKind::AiResponse {
                message: decision.message,
                should_continue: decision.should_continue,
                next_action: decision.next_action,
                source: decision.source,
            },
        )
        .await?;

        if call.is_terminal() {
            tracing::info!(call_id = %call.id, next_action = %decision.next_action, "Agent ended conversation");
        }
        Ok(response)
    }

    async fn status(&self, call_id: Uuid, report: StatusReport) -> Result<VoiceResponse, DomainError> {
        let _guard = self.locks.acquire(call_id).await;
        let Some(mut call) = self.calls.find_by_id(call_id).await? else {
            tracing::warn!(call_id = %call_id, "Status callback for unknown call");
            return Ok(VoiceResponse::empty());
        };

        let reported_status = report.status.unwrap_or_default();
        let mapped_status = CallStatus::from_gateway(&reported_status);

        let applied = match mapped_status {
            Some(status) => match call.apply(CallTrigger::GatewayReported(status)) {
                Ok(transition) => transition.changed(),
                Err(e) => {
                    tracing::warn!(call_id = %call.id, reported = %reported_status, reason = %e, "Status report not applied");
                    false
                }
            },
            None => {
                tracing::warn!(call_id = %call.id, reported = %reported_status, "Unrecognized gateway status");
                false
            }
        };

        let had_ended_at = call.ended_at.is_some();
        if call.is_terminal() {
            call.mark_ended();
        }
        let mut dirty = applied || (!had_ended_at && call.ended_at.is_some());

        let mut credits_charged = None;
        let mut billing_error = None;
        if let Some(duration) = report.duration_secs {
            match self.accountant.settle(call.clone(), duration).await {
                Ok((settled, credits)) => {
                    if credits.is_some() {
                        dirty = false;
                    }
                    call = settled;
                    credits_charged = credits;
                }
                // Left unbilled; a redelivered report retries the charge
                Err(e) => {
                    tracing::error!(call_id = %call.id, duration, error = %e, "Usage charge failed");
                    billing_error = Some(e.to_string());
                }
            }
        }

        let saved = if dirty {
            self.calls.update(&call).await.map(Some)
        } else {
            Ok(None)
        };

        self.record(
            call_id,
            CallEventKind::StatusUpdate {
                reported_status,
                mapped_status,
                duration_secs: report.duration_secs,
                credits_charged,
                applied,
                billing_error,
            },
        )
        .await?;

        let call = saved?.unwrap_or(call);
        if applied {
            tracing::info!(call_id = %call.id, status = %call.status, "Call status updated");
        }
        Ok(VoiceResponse::empty())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn require_account(&self, owner_id: Uuid) -> Result<(), DomainError> {
        self.accounts
            .find_by_id(owner_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("Account", owner_id))
    }

    /// Calls of other owners are reported as missing
    async fn owned_call(&self, owner_id: Uuid, call_id: Uuid) -> Result<Call, DomainError> {
        self.calls
            .find_by_id(call_id)
            .await?
            .filter(|call| call.owner_id == owner_id)
            .ok_or_else(|| DomainError::not_found("Call", call_id))
    }

    async fn record(&self, call_id: Uuid, event: CallEventKind) -> Result<(), DomainError> {
        self.calls
            .append_event(&CallEvent::new(call_id, event))
            .await
            .map(|_| ())
    }

    /// Best effort: a store that just failed may refuse this too
    async fn record_failure(&self, call_id: Uuid, callback: CallbackKind, error: &DomainError) {
        let event = CallEventKind::CallbackFailed {
            callback,
            error: error.to_string(),
        };
        if let Err(e) = self.record(call_id, event).await {
            tracing::warn!(call_id = %call_id, error = %e, "Could not record callback failure");
        }
    }

    async fn ignore(&self, call: &Call, callback: CallbackKind) -> Result<(), DomainError> {
        tracing::warn!(call_id = %call.id, status = %call.status, ?callback, "Ignoring late or duplicate callback");
        self.record(
            call.id,
            CallEventKind::CallbackIgnored {
                callback,
                status: call.status,
            },
        )
        .await
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        future: impl Future<Output = Result<T, DomainError>>,
    ) -> Result<T, DomainError> {
        tokio::time::timeout(self.gateway_timeout, future)
            .await
            .unwrap_or_else(|_| Err(DomainError::timeout(operation, self.gateway_timeout)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, ScriptedGateway, ScriptedProvider, GOODBYE_REPLY};
    use ringline::domain::services::agent::HANDOFF_MESSAGE;
    use ringline::DecisionSource;

    async fn place(h: &Harness) -> Call {
        h.orchestrator()
            .initiate(
                h.account.id,
                InitiateCall {
                    phone_number: "+15551234567".to_string(),
                    objective: Some("Confirm the 5pm appointment".to_string()),
                    ..InitiateCall::default()
                },
            )
            .await
            .unwrap()
    }

    async fn kinds(h: &Harness, call_id: Uuid) -> Vec<&'static str> {
        h.calls
            .find_events(call_id)
            .await
            .unwrap()
            .iter()
            .map(CallEvent::kind)
            .collect()
    }

    async fn reload(h: &Harness, call_id: Uuid) -> Call {
        h.calls.find_by_id(call_id).await.unwrap().unwrap()
    }

    fn completed_after(secs: i32) -> StatusReport {
        StatusReport {
            status: Some("completed".to_string()),
            duration_secs: Some(secs),
        }
    }

    #[tokio::test]
    async fn test_initiate_places_ringing_call() {
        let h = Harness::new().await;
        let call = place(&h).await;

        assert_eq!(call.status, CallStatus::Ringing);
        assert!(call.gateway_call_ref.is_some());
        assert_eq!(kinds(&h, call.id).await, ["ai_message_prepared"]);

        let placed = h.gateway.placed.lock().unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].to, "+15551234567");
        assert!(placed[0].connected_url.contains(&call.id.to_string()));
        assert!(placed[0]
            .status_url
            .ends_with(&h.state.signer.token(call.id).unwrap()));
    }

    #[tokio::test]
    async fn test_initiate_rejected_keeps_failed_call() {
        let h = Harness::with(ScriptedGateway::rejecting(), ScriptedProvider::default()).await;
        let result = h
            .orchestrator()
            .initiate(
                h.account.id,
                InitiateCall {
                    phone_number: "+15551234567".to_string(),
                    ..InitiateCall::default()
                },
            )
            .await;
        assert!(matches!(result, Err(DomainError::ExternalService(_))));

        let calls = h.orchestrator().list_calls(h.account.id, 10).await.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, CallStatus::Failed);
        assert!(calls[0].ended_at.is_some());
        assert_eq!(kinds(&h, calls[0].id).await, ["call_failed"]);
    }

    #[tokio::test]
    async fn test_initiate_validates_before_dialing() {
        let h = Harness::new().await;
        let bad_number = h
            .orchestrator()
            .initiate(
                h.account.id,
                InitiateCall {
                    phone_number: "12".to_string(),
                    ..InitiateCall::default()
                },
            )
            .await;
        assert!(matches!(bad_number, Err(DomainError::Validation(_))));

        let unknown_owner = h
            .orchestrator()
            .initiate(
                Uuid::new_v4(),
                InitiateCall {
                    phone_number: "+15551234567".to_string(),
                    ..InitiateCall::default()
                },
            )
            .await;
        assert!(matches!(unknown_owner, Err(DomainError::NotFound { .. })));
        assert!(h.gateway.placed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connected_speaks_opening_and_listens() {
        let h = Harness::new().await;
        let call = place(&h).await;

        let doc = h.orchestrator().on_connected(call.id).await;
        assert!(doc.listens());
        assert_eq!(
            doc.spoken(),
            ["Hi, this is Ringline calling about your appointment."]
        );

        let call = reload(&h, call.id).await;
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.conversation.len(), 1);
        assert_eq!(call.conversation[0].role, TurnRole::Assistant);

        // A redelivered connected callback repeats the opening without a second turn
        let again = h.orchestrator().on_connected(call.id).await;
        assert!(again.listens());
        assert_eq!(reload(&h, call.id).await.conversation.len(), 1);
        assert_eq!(
            kinds(&h, call.id).await,
            ["ai_message_prepared", "call_answered", "callback_ignored"]
        );
    }

    #[tokio::test]
    async fn test_connected_falls_back_when_model_is_down() {
        let h = Harness::with(ScriptedGateway::default(), ScriptedProvider::failing()).await;
        let call = place(&h).await;

        let doc = h.orchestrator().on_connected(call.id).await;
        assert_eq!(doc.spoken(), [DEFAULT_OPENING]);
        assert!(doc.listens());

        let events = h.calls.find_events(call.id).await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e.event,
            CallEventKind::CallAnswered { fallback: true, .. }
        )));
    }

    #[tokio::test]
    async fn test_speech_continues_then_hangs_up() {
        let h = Harness::with(
            ScriptedGateway::default(),
            ScriptedProvider::with_turns([
                Ok(crate::testing::LISTEN_REPLY),
                Ok(GOODBYE_REPLY),
            ]),
        )
        .await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        let doc = h.orchestrator().on_speech(call.id, "Who is this?").await;
        assert!(doc.listens());
        assert_eq!(doc.spoken(), ["Sure, tell me more."]);
        assert_eq!(reload(&h, call.id).await.status, CallStatus::InProgress);

        let doc = h.orchestrator().on_speech(call.id, "Yes, 5pm works").await;
        assert!(doc.ends_call());
        assert_eq!(doc.spoken(), ["Thanks, goodbye!"]);

        let call = reload(&h, call.id).await;
        assert_eq!(call.status, CallStatus::Completed);
        assert!(call.ended_at.is_some());
        let roles: Vec<TurnRole> = call.conversation.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            [
                TurnRole::Assistant,
                TurnRole::User,
                TurnRole::Assistant,
                TurnRole::User,
                TurnRole::Assistant
            ]
        );

        // The model saw the earlier exchange on the second turn
        let requests = h.provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].iter().any(|m| m.content == "Who is this?"));
    }

    #[tokio::test]
    async fn test_speech_with_failing_model_hands_off() {
        let h = Harness::with(ScriptedGateway::default(), ScriptedProvider::failing()).await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        let doc = h.orchestrator().on_speech(call.id, "Hello?").await;
        assert!(doc.ends_call());
        assert_eq!(doc.spoken(), [HANDOFF_MESSAGE]);
        assert_eq!(reload(&h, call.id).await.status, CallStatus::Completed);

        let events = h.calls.find_events(call.id).await.unwrap();
        assert!(events.iter().any(|e| matches!(
            e.event,
            CallEventKind::AiResponse {
                source: DecisionSource::Fallback,
                should_continue: false,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn test_speech_before_connected_answers_call() {
        let h = Harness::new().await;
        let call = place(&h).await;

        let doc = h.orchestrator().on_speech(call.id, "Hello?").await;
        assert!(doc.listens());
        assert_eq!(reload(&h, call.id).await.status, CallStatus::InProgress);
    }

    #[tokio::test]
    async fn test_speech_after_end_is_ignored() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;
        h.orchestrator().end_call(h.account.id, call.id).await.unwrap();

        let doc = h.orchestrator().on_speech(call.id, "Are you there?").await;
        assert_eq!(doc.verbs, VoiceResponse::hangup().verbs);
        assert_eq!(h.provider.turn_requests(), 0);

        let call = reload(&h, call.id).await;
        assert_eq!(call.conversation.len(), 1);
        assert_eq!(kinds(&h, call.id).await.last(), Some(&"callback_ignored"));
    }

    #[tokio::test]
    async fn test_callbacks_for_unknown_call() {
        let h = Harness::new().await;
        let id = Uuid::new_v4();

        assert!(h.orchestrator().on_connected(id).await.ends_call());
        assert!(h.orchestrator().on_speech(id, "hi").await.ends_call());
        assert!(h
            .orchestrator()
            .on_status(id, completed_after(30))
            .await
            .verbs
            .is_empty());
        assert_eq!(h.balance().await, 1000);
    }

    #[tokio::test]
    async fn test_status_bills_once() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        h.orchestrator().on_status(call.id, completed_after(61)).await;
        let billed = reload(&h, call.id).await;
        assert_eq!(billed.status, CallStatus::Completed);
        assert_eq!(billed.duration_secs, 61);
        assert_eq!(billed.credits_charged, 2);
        assert!(billed.is_billed());
        assert_eq!(h.balance().await, 998);

        // Redelivery is recorded but charges nothing
        h.orchestrator().on_status(call.id, completed_after(61)).await;
        assert_eq!(reload(&h, call.id).await.credits_charged, 2);
        assert_eq!(h.balance().await, 998);

        let updates: Vec<Option<i32>> = h
            .calls
            .find_events(call.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|e| match e.event {
                CallEventKind::StatusUpdate {
                    credits_charged, ..
                } => Some(credits_charged),
                _ => None,
            })
            .collect();
        assert_eq!(updates, [Some(2), None]);
    }

    #[tokio::test]
    async fn test_status_zero_duration_is_free() {
        let h = Harness::new().await;
        let call = place(&h).await;

        h.orchestrator()
            .on_status(
                call.id,
                StatusReport {
                    status: Some("no-answer".to_string()),
                    duration_secs: Some(0),
                },
            )
            .await;

        let call = reload(&h, call.id).await;
        assert_eq!(call.status, CallStatus::NoAnswer);
        assert_eq!(call.credits_charged, 0);
        assert_eq!(h.balance().await, 1000);
    }

    #[tokio::test]
    async fn test_status_never_moves_backwards() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        h.orchestrator()
            .on_status(
                call.id,
                StatusReport {
                    status: Some("ringing".to_string()),
                    duration_secs: None,
                },
            )
            .await;
        h.orchestrator()
            .on_status(
                call.id,
                StatusReport {
                    status: Some("teleported".to_string()),
                    duration_secs: None,
                },
            )
            .await;

        assert_eq!(reload(&h, call.id).await.status, CallStatus::InProgress);
        let events = h.calls.find_events(call.id).await.unwrap();
        let applied: Vec<bool> = events
            .iter()
            .filter_map(|e| match e.event {
                CallEventKind::StatusUpdate { applied, .. } => Some(applied),
                _ => None,
            })
            .collect();
        assert_eq!(applied, [false, false]);
    }

    #[tokio::test]
    async fn test_status_keeps_failed_charge_visible_and_retries() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        h.fail_billing(true);
        h.orchestrator().on_status(call.id, completed_after(120)).await;
        h.orchestrator().on_status(call.id, completed_after(120)).await;

        // Status moved on, but nothing was billed or debited
        let stored = reload(&h, call.id).await;
        assert_eq!(stored.status, CallStatus::Completed);
        assert!(!stored.is_billed());
        assert_eq!(stored.credits_charged, 0);
        assert_eq!(h.balance().await, 1000);

        let failures: Vec<(Option<i32>, bool)> = h
            .calls
            .find_events(call.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|e| match e.event {
                CallEventKind::StatusUpdate {
                    credits_charged,
                    billing_error,
                    ..
                } => Some((credits_charged, billing_error.is_some())),
                _ => None,
            })
            .collect();
        assert_eq!(failures, [(None, true), (None, true)]);

        // Once billing recovers the next redelivery charges exactly once
        h.fail_billing(false);
        h.orchestrator().on_status(call.id, completed_after(120)).await;
        h.orchestrator().on_status(call.id, completed_after(120)).await;

        let stored = reload(&h, call.id).await;
        assert!(stored.is_billed());
        assert_eq!(stored.credits_charged, 2);
        assert_eq!(h.balance().await, 998);
    }

    #[tokio::test]
    async fn test_failed_callback_is_recorded() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        h.fail_updates(true);
        let doc = h.orchestrator().on_speech(call.id, "Can we move it to 6?").await;
        assert!(doc.ends_call());
        assert_eq!(doc.spoken(), [ringline::domain::services::TECHNICAL_DIFFICULTIES]);

        // The unsaved turn leaves no user_input or ai_response behind
        assert_eq!(
            kinds(&h, call.id).await,
            ["ai_message_prepared", "call_answered", "callback_failed"]
        );
        assert_eq!(reload(&h, call.id).await.conversation.len(), 1);

        let events = h.calls.find_events(call.id).await.unwrap();
        assert!(matches!(
            &events.last().unwrap().event,
            CallEventKind::CallbackFailed {
                callback: CallbackKind::SpeechGathered,
                error,
            } if error.contains("call store unavailable")
        ));
    }

    #[tokio::test]
    async fn test_connected_after_end_hangs_up() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;
        h.orchestrator().end_call(h.account.id, call.id).await.unwrap();
        let before = reload(&h, call.id).await;

        let doc = h.orchestrator().on_connected(call.id).await;
        assert_eq!(doc.verbs, VoiceResponse::hangup().verbs);

        let after = reload(&h, call.id).await;
        assert_eq!(after.status, CallStatus::Completed);
        assert_eq!(after.version, before.version);
        assert_eq!(after.conversation, before.conversation);
        assert_eq!(kinds(&h, call.id).await.last(), Some(&"callback_ignored"));
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_serialize_per_call() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().on_connected(call.id).await;

        let orchestrator = h.orchestrator();
        tokio::join!(
            orchestrator.on_speech(call.id, "Is 5pm still on?"),
            orchestrator.on_speech(call.id, "Hello?"),
            orchestrator.on_status(call.id, completed_after(61)),
        );

        let stored = reload(&h, call.id).await;
        assert_eq!(stored.status, CallStatus::Completed);
        assert_eq!(stored.conversation[0].role, TurnRole::Assistant);
        assert!(stored
            .conversation
            .windows(2)
            .all(|pair| pair[0].role != pair[1].role));
        assert_eq!(stored.conversation.len() % 2, 1);

        assert_eq!(stored.credits_charged, 2);
        assert_eq!(h.balance().await, 998);

        let events = kinds(&h, call.id).await;
        assert_eq!(events.iter().filter(|k| **k == "status_update").count(), 1);
        let users = stored
            .conversation
            .iter()
            .filter(|t| t.role == TurnRole::User)
            .count();
        assert_eq!(events.iter().filter(|k| **k == "user_input").count(), users);
        assert!(!events.contains(&"callback_failed"));
    }

    #[tokio::test]
    async fn test_responses_use_requested_voice() {
        let h = Harness::new().await;
        let call = h
            .orchestrator()
            .initiate(
                h.account.id,
                InitiateCall {
                    phone_number: "+15551234567".to_string(),
                    voice: Some("Polly.Joanna".to_string()),
                    ..InitiateCall::default()
                },
            )
            .await
            .unwrap();

        let opening = h.orchestrator().on_connected(call.id).await;
        assert_eq!(opening.voice.as_deref(), Some("Polly.Joanna"));
        assert!(opening.verbs.iter().any(|v| matches!(
            v,
            ringline::Verb::Gather { prompt: Some(p), .. } if p == OPENING_PROMPT
        )));

        let reply = h.orchestrator().on_speech(call.id, "Hi").await;
        assert_eq!(reply.voice.as_deref(), Some("Polly.Joanna"));
    }

    #[tokio::test]
    async fn test_end_call_survives_gateway_failure() {
        let h = Harness::with(ScriptedGateway::failing_end(), ScriptedProvider::default()).await;
        let call = place(&h).await;

        let ended = h.orchestrator().end_call(h.account.id, call.id).await.unwrap();
        assert_eq!(ended.status, CallStatus::Completed);
        assert_eq!(h.gateway.ended.lock().unwrap().len(), 1);

        let events = h.calls.find_events(call.id).await.unwrap();
        assert!(matches!(
            &events.last().unwrap().event,
            CallEventKind::CallEndedByUser {
                gateway_error: Some(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_end_finished_call_is_noop() {
        let h = Harness::new().await;
        let call = place(&h).await;
        h.orchestrator().end_call(h.account.id, call.id).await.unwrap();
        let before = kinds(&h, call.id).await.len();

        let again = h.orchestrator().end_call(h.account.id, call.id).await.unwrap();
        assert_eq!(again.status, CallStatus::Completed);
        assert_eq!(kinds(&h, call.id).await.len(), before);
        assert_eq!(h.gateway.ended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_limit_and_stats() {
        let h = Harness::new().await;
        let first = place(&h).await;
        place(&h).await;
        h.orchestrator().on_connected(first.id).await;
        h.orchestrator().on_status(first.id, completed_after(90)).await;

        assert!(matches!(
            h.orchestrator().list_calls(h.account.id, 0).await,
            Err(DomainError::Validation(_))
        ));
        assert_eq!(
            h.orchestrator().list_calls(h.account.id, 1).await.unwrap().len(),
            1
        );
        assert_eq!(h.orchestrator().list_active(h.account.id).await.unwrap().len(), 1);

        let stats = h.orchestrator().stats(h.account.id).await.unwrap();
        assert_eq!(
            stats,
            CallStats {
                total_calls: 2,
                active_calls: 1,
                success_rate: 50.0,
                credits_used: 2,
            }
        );
    }

    #[test]
    fn test_stats_of_no_calls() {
        let stats = CallStats::from_calls(&[]);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.success_rate, 0.0);
    }
}
