//! Account Application Service (Use Case)

use std::sync::Arc;
use uuid::Uuid;

use ringline::{Account, AccountRepository, DomainError};

/// Application service for account operations
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    /// Open an account with an initial credit balance (default 1000)
    pub async fn create(&self, name: String, credits: Option<i32>) -> Result<Account, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::Validation("account name is required".to_string()));
        }
        if credits.is_some_and(|c| c < 0) {
            return Err(DomainError::Validation(
                "initial credits cannot be negative".to_string(),
            ));
        }

        let account = self.repo.insert(&Account::new(name, credits)).await?;
        tracing::info!("Created account: {} ({})", account.name, account.id);
        Ok(account)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Account, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Account", id))
    }
}
