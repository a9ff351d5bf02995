//! Account Repository Port

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{errors::DomainError, Account};

/// Repository interface for Account entities
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Find an account by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError>;

    /// Insert a new account
    async fn insert(&self, account: &Account) -> Result<Account, DomainError>;

    // Debits go through `CallRepository::charge`, together with the billed call.
}
