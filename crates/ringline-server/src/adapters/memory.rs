//! In-memory repository implementations
//!
//! Used with `STORAGE=memory` and by the application tests. Same contract as
//! the Postgres adapters, including the version check on update.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use ringline::{Account, AccountRepository, Call, CallEvent, CallRepository, DomainError};

pub struct InMemoryCallRepository {
    calls: RwLock<HashMap<Uuid, Call>>,
    /// Insertion order is the event order
    events: RwLock<Vec<CallEvent>>,
    /// Debited by `charge` while the calls lock is held
    accounts: Arc<InMemoryAccountRepository>,
}

impl InMemoryCallRepository {
    pub fn new(accounts: Arc<InMemoryAccountRepository>) -> Self {
        Self {
            calls: RwLock::default(),
            events: RwLock::default(),
            accounts,
        }
    }
}

fn check_version(stored: &Call, call: &Call) -> Result<(), DomainError> {
    if stored.version != call.version {
        return Err(DomainError::Conflict(format!(
            "call {} was modified concurrently (expected version {}, found {})",
            call.id, call.version, stored.version
        )));
    }
    Ok(())
}

fn newest_first(mut calls: Vec<Call>) -> Vec<Call> {
    calls.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    calls
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn insert(&self, call: &Call) -> Result<Call, DomainError> {
        let mut calls = self.calls.write().await;
        if calls.contains_key(&call.id) {
            return Err(DomainError::Conflict(format!("call {} already exists", call.id)));
        }
        calls.insert(call.id, call.clone());
        Ok(call.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        Ok(self.calls.read().await.get(&id).cloned())
    }

    async fn update(&self, call: &Call) -> Result<Call, DomainError> {
        let mut calls = self.calls.write().await;
        let stored = calls
            .get_mut(&call.id)
            .ok_or_else(|| DomainError::not_found("Call", call.id))?;
        check_version(stored, call)?;

        let mut updated = call.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn charge(&self, call: &Call, credits: i32) -> Result<(Call, Account), DomainError> {
        // Lock order: calls, then accounts. Both checks pass before anything is written.
        let mut calls = self.calls.write().await;
        let mut accounts = self.accounts.accounts.write().await;

        let stored = calls
            .get_mut(&call.id)
            .ok_or_else(|| DomainError::not_found("Call", call.id))?;
        check_version(stored, call)?;
        let account = accounts
            .get_mut(&call.owner_id)
            .ok_or_else(|| DomainError::not_found("Account", call.owner_id))?;

        account.credits = account.balance_after(credits.max(0));
        let mut updated = call.clone();
        updated.version += 1;
        *stored = updated.clone();
        Ok((updated, account.clone()))
    }

    async fn find_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Call>, DomainError> {
        let calls = self.calls.read().await;
        let owned = calls
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(newest_first(owned).into_iter().take(limit).collect())
    }

    async fn find_active(&self, owner_id: Uuid) -> Result<Vec<Call>, DomainError> {
        let calls = self.calls.read().await;
        let active = calls
            .values()
            .filter(|c| c.owner_id == owner_id && !c.is_terminal())
            .cloned()
            .collect();
        Ok(newest_first(active))
    }

    async fn append_event(&self, event: &CallEvent) -> Result<CallEvent, DomainError> {
        self.events.write().await.push(event.clone());
        Ok(event.clone())
    }

    async fn find_events(&self, call_id: Uuid) -> Result<Vec<CallEvent>, DomainError> {
        Ok(self
            .events
            .read()
            .await
            .iter()
            .filter(|e| e.call_id == call_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, DomainError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn insert(&self, account: &Account) -> Result<Account, DomainError> {
        self.accounts
            .write()
            .await
            .insert(account.id, account.clone());
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringline::PhoneNumber;

    fn call_for(owner: Uuid) -> Call {
        Call::new(
            owner,
            PhoneNumber::parse("+15551230000").unwrap(),
            None,
            None,
            None,
        )
    }

    fn repos() -> (InMemoryCallRepository, Arc<InMemoryAccountRepository>) {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        (InMemoryCallRepository::new(accounts.clone()), accounts)
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let (repo, _) = repos();
        let call = repo.insert(&call_for(Uuid::new_v4())).await.unwrap();

        let saved = repo.update(&call).await.unwrap();
        assert_eq!(saved.version, 1);

        let err = repo.update(&call).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_charge_clamps_at_zero() {
        let (repo, accounts) = repos();
        let account = accounts
            .insert(&Account::new("Acme".to_string(), Some(3)))
            .await
            .unwrap();
        let call = repo.insert(&call_for(account.id)).await.unwrap();

        let (saved, after) = repo.charge(&call, 5).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(after.credits, 0);
    }

    #[tokio::test]
    async fn test_charge_writes_nothing_on_stale_version() {
        let (repo, accounts) = repos();
        let account = accounts
            .insert(&Account::new("Acme".to_string(), Some(10)))
            .await
            .unwrap();
        let call = repo.insert(&call_for(account.id)).await.unwrap();
        repo.update(&call).await.unwrap();

        let mut billed = call.clone();
        billed.credits_charged = 4;
        let err = repo.charge(&billed, 4).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let stored = repo.find_by_id(call.id).await.unwrap().unwrap();
        assert_eq!(stored.credits_charged, 0);
        let account = accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(account.credits, 10);
    }

    #[tokio::test]
    async fn test_charge_for_unknown_owner_keeps_call_unbilled() {
        let (repo, _) = repos();
        let call = repo.insert(&call_for(Uuid::new_v4())).await.unwrap();

        let err = repo.charge(&call, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert_eq!(repo.find_by_id(call.id).await.unwrap().unwrap().version, 0);
    }
}
