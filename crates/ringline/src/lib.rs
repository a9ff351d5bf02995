//! Ringline Domain Library
//!
//! Core domain types and interfaces for the Ringline outbound voice agent.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure business entities and logic
//!   - `entities/`: Core domain models (Call, CallEvent, Account)
//!   - `value_objects/`: Immutable value types (CallStatus, PhoneNumber, NextAction)
//!   - `services/`: Lifecycle state machine, billing, conversation agent
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: Call record and account storage
//!   - `services/`: Language generation and telephony gateway
//!
//! # Usage
//!
//! ```rust,ignore
//! use ringline::domain::{Call, CallStatus, PhoneNumber};
//! use ringline::ports::{CallRepository, TelephonyGateway};
//! ```

pub mod domain;
pub mod ports;

// Re-export commonly used types
pub use domain::services::{
    AgentDecision, CallTrigger, ConversationAgent, DecisionSource, Opening, ProviderCheck, Verb,
    VoiceResponse,
};
pub use domain::{
    Account, Call, CallEvent, CallEventKind, CallStatus, CallTurn, CallbackKind, DomainError,
    NextAction, PhoneNumber, TurnRole,
};
pub use ports::{
    AccountRepository, CallRepository, ChatMessage, CompletionOptions, CompletionResponse,
    LlmProvider, MessageRole, OriginNumber, PlaceCall, PlacedCall, TelephonyGateway, TokenUsage,
};
