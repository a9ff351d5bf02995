//! Domain Services
//!
//! Stateless rules that span entities: the call lifecycle state machine,
//! usage pricing, the conversation agent and voice response documents.

pub mod agent;
pub mod billing;
pub mod lifecycle;
pub mod voice_response;

pub use agent::{AgentDecision, ConversationAgent, DecisionSource, Opening, ProviderCheck};
pub use billing::credits_for_duration;
pub use lifecycle::{CallTrigger, Transition, TransitionError};
pub use voice_response::{
    Verb, VoiceResponse, CONTINUE_PROMPT, OPENING_PROMPT, TECHNICAL_DIFFICULTIES,
};
