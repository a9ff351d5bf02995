//! Call Repository Port
//!
//! Abstract interface for the call record store: a mutable call projection
//! plus an append-only event log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{errors::DomainError, Account, Call, CallEvent};

/// Repository interface for Call and CallEvent entities
#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Insert a freshly created call
    async fn insert(&self, call: &Call) -> Result<Call, DomainError>;

    /// Find a call by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError>;

    /// Persist a modified call.
    ///
    /// Succeeds only if the stored version still equals `call.version`;
    /// returns the stored call with its version bumped. A stale version
    /// yields `DomainError::Conflict`.
    async fn update(&self, call: &Call) -> Result<Call, DomainError>;

    /// Persist a billed call and debit its owner `credits` as one unit.
    ///
    /// Same version check as `update`. The owner's balance is clamped at
    /// zero. Either both writes land or neither does; returns the stored
    /// call and the debited account.
    async fn charge(&self, call: &Call, credits: i32) -> Result<(Call, Account), DomainError>;

    /// Calls for an owner, newest first
    async fn find_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Call>, DomainError>;

    /// Non-terminal calls for an owner, newest first
    async fn find_active(&self, owner_id: Uuid) -> Result<Vec<Call>, DomainError>;

    // --- Event log ---

    /// Append an audit event
    async fn append_event(&self, event: &CallEvent) -> Result<CallEvent, DomainError>;

    /// Events for a call, oldest first
    async fn find_events(&self, call_id: Uuid) -> Result<Vec<CallEvent>, DomainError>;
}
