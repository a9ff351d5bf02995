//! Infrastructure Adapters
//!
//! Implementations of domain ports for external systems.

pub mod memory;
pub mod openai;
pub mod postgres;
pub mod twilio;

// Re-exports
pub use memory::{InMemoryAccountRepository, InMemoryCallRepository};
pub use openai::{OpenAiProvider, UnconfiguredProvider};
pub use postgres::{PgAccountRepository, PgCallRepository};
pub use twilio::TwilioGateway;
