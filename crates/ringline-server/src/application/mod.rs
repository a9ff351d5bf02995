//! Application Layer (Use Cases)
//!
//! Orchestrates domain operations and coordinates between
//! repositories and external services.

mod account_service;
mod call_service;
mod locks;
mod usage;

pub use account_service::AccountService;
pub use call_service::{CallOrchestrator, CallStats, InitiateCall, StatusReport};
