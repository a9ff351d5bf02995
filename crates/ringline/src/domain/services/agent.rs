//! Conversation Agent - Language generation for live calls
//!
//! Turns the transcript, the call objective and the caller's latest utterance
//! into a structured decision. Provider output is never trusted: malformed
//! replies are repaired, and transport failures or timeouts fall back to a
//! fixed handoff message that ends the call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::{CallTurn, TurnRole};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::NextAction;
use crate::ports::{ChatMessage, CompletionOptions, CompletionResponse, LlmProvider, TokenUsage};

pub const DEFAULT_OPENING: &str = "Hello! This is an AI assistant. How can I help you today?";
pub const CLARIFY_MESSAGE: &str = "I'm sorry, I didn't catch that. Could you repeat?";
pub const GENERIC_APOLOGY: &str = "I'm having trouble processing that. Let me try again.";
pub const HANDOFF_MESSAGE: &str =
    "I'm experiencing some technical difficulties. Let me connect you with someone who can help.";

/// Stand-in for an empty utterance so the model sees that the caller was silent
const SILENCE_MARKER: &str = "(The caller did not say anything.)";

/// Objective used for the provider connectivity check
const CHECK_OBJECTIVE: &str = "Test call";

const TURN_MAX_TOKENS: u32 = 150;
const OPENING_MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.7;

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Well-formed structured reply
    Model,
    /// Reply was usable only after filling gaps or treating it as plain text
    Repaired,
    /// Provider failed or timed out; fixed text substituted
    Fallback,
}

/// What the agent says next and whether the call goes on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    pub message: String,
    pub should_continue: bool,
    pub next_action: NextAction,
    pub source: DecisionSource,
}

impl AgentDecision {
    /// Conservative decision used whenever generation fails outright
    pub fn handoff() -> Self {
        Self {
            message: HANDOFF_MESSAGE.to_string(),
            should_continue: false,
            next_action: NextAction::Hangup,
            source: DecisionSource::Fallback,
        }
    }

    /// Only an explicit "continue and listen" keeps the line open
    pub fn keeps_listening(&self) -> bool {
        self.should_continue && self.next_action == NextAction::Listen
    }
}

/// Opening line spoken when the destination answers
#[derive(Debug, Clone, PartialEq)]
pub struct Opening {
    pub line: String,
    pub fallback: bool,
}

/// Outcome of a live round trip to the language provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderCheck {
    pub provider: String,
    pub model: String,
    pub reply: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
    pub latency_ms: u64,
}

/// Language generation adapter used by the call orchestrator
#[derive(Clone)]
pub struct ConversationAgent {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl ConversationAgent {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Decide the next reply. Never fails; see module docs for fallbacks.
    pub async fn respond(
        &self,
        history: &[CallTurn],
        objective: &str,
        utterance: &str,
        model: &str,
    ) -> AgentDecision {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(turn_system_prompt(objective)));
        messages.extend(history.iter().map(turn_to_message));
        messages.push(ChatMessage::user(spoken_or_silence(utterance)));

        let options = CompletionOptions {
            model: Some(model.to_string()),
            max_tokens: Some(TURN_MAX_TOKENS),
            temperature: Some(TEMPERATURE),
            json_response: true,
        };

        match self.complete(&messages, &options).await {
            Ok(response) => parse_decision(&response.content),
            Err(e) => {
                tracing::warn!(error = %e, "Language generation failed, handing off");
                AgentDecision::handoff()
            }
        }
    }

    /// Generate an opening line for a call with the given objective
    pub async fn opening_line(&self, objective: &str, model: &str) -> Opening {
        let messages = vec![ChatMessage::system(opening_system_prompt(objective))];
        let options = opening_options(Some(model));

        match self.complete(&messages, &options).await {
            Ok(response) if !response.content.trim().is_empty() => Opening {
                line: response.content.trim().to_string(),
                fallback: false,
            },
            Ok(_) => {
                tracing::warn!("Opening line came back empty, using default");
                default_opening()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Opening line generation failed, using default");
                default_opening()
            }
        }
    }

    /// Generate one opening line with the provider's default model and report
    /// the round trip. Unlike call-time generation, failures are returned.
    pub async fn check(&self) -> Result<ProviderCheck, DomainError> {
        let messages = vec![ChatMessage::system(opening_system_prompt(CHECK_OBJECTIVE))];
        let started = Instant::now();
        let response = self.complete(&messages, &opening_options(None)).await?;

        Ok(ProviderCheck {
            provider: self.provider.provider_name().to_string(),
            model: response.model,
            reply: response.content.trim().to_string(),
            usage: response.usage,
            finish_reason: response.finish_reason,
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        let response =
            match tokio::time::timeout(self.timeout, self.provider.complete(messages, options)).await {
                Ok(result) => result?,
                Err(_) => return Err(DomainError::timeout("language generation", self.timeout)),
            };

        tracing::debug!(
            model = %response.model,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            finish_reason = ?response.finish_reason,
            "Language generation finished"
        );
        if response.finish_reason.as_deref() == Some("length") {
            tracing::warn!(model = %response.model, "Reply was cut off at the token limit");
        }
        Ok(response)
    }
}

fn opening_options(model: Option<&str>) -> CompletionOptions {
    CompletionOptions {
        model: model.map(str::to_string),
        max_tokens: Some(OPENING_MAX_TOKENS),
        temperature: Some(TEMPERATURE),
        json_response: false,
    }
}

fn default_opening() -> Opening {
    Opening {
        line: DEFAULT_OPENING.to_string(),
        fallback: true,
    }
}

fn turn_to_message(turn: &CallTurn) -> ChatMessage {
    match turn.role {
        TurnRole::User => ChatMessage::user(spoken_or_silence(&turn.content)),
        TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
    }
}

fn spoken_or_silence(text: &str) -> String {
    if text.trim().is_empty() {
        SILENCE_MARKER.to_string()
    } else {
        text.trim().to_string()
    }
}

fn turn_system_prompt(objective: &str) -> String {
    format!(
        r#"You are an AI assistant making a phone call. Your objective is: {objective}

Guidelines:
- Keep responses conversational and natural for phone calls
- Be concise but engaging
- Listen actively and respond appropriately
- If the person wants to end the call, be polite and respectful
- Always maintain a professional but friendly tone
- Respond in a way that sounds natural when spoken aloud

Current conversation context: The call is in progress.

IMPORTANT: You must respond with a JSON object in this exact format:
{{
  "message": "Your response message here",
  "shouldContinue": true/false,
  "nextAction": "listen"/"hangup"/"transfer"
}}"#
    )
}

fn opening_system_prompt(objective: &str) -> String {
    format!(
        "Generate a natural, professional opening message for a phone call. The objective is: {objective}\n\n\
         Make it sound conversational and appropriate for a phone call. Keep it brief and engaging."
    )
}

/// Interpret raw provider output as a decision.
///
/// A JSON object is read leniently (camelCase or snake_case keys, missing
/// fields defaulted). Anything else is spoken as-is and the call continues.
pub fn parse_decision(raw: &str) -> AgentDecision {
    let body = strip_code_fence(raw);

    let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) else {
        let text = raw.trim();
        return AgentDecision {
            message: if text.is_empty() {
                GENERIC_APOLOGY.to_string()
            } else {
                text.to_string()
            },
            should_continue: true,
            next_action: NextAction::Listen,
            source: DecisionSource::Repaired,
        };
    };

    let field = |camel: &str, snake: &str| fields.get(camel).or_else(|| fields.get(snake)).cloned();

    let message = fields
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let should_continue = field("shouldContinue", "should_continue").and_then(|v| v.as_bool());
    let next_action = field("nextAction", "next_action")
        .and_then(|v| v.as_str().and_then(|s| s.parse::<NextAction>().ok()));

    let complete = message.is_some() && should_continue.is_some() && next_action.is_some();

    AgentDecision {
        message: message.unwrap_or_else(|| CLARIFY_MESSAGE.to_string()),
        should_continue: should_continue.unwrap_or(true),
        next_action: next_action.unwrap_or_default(),
        source: if complete {
            DecisionSource::Model
        } else {
            DecisionSource::Repaired
        },
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_prefix("json").unwrap_or(body);
    body.strip_suffix("```").unwrap_or(body).trim()
}
