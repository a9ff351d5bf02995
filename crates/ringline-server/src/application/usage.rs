//! Usage Accountant
//!
//! Converts a finished call's duration into credits and debits the owner,
//! at most once per call.

use std::sync::Arc;

use chrono::Utc;

use ringline::domain::services::credits_for_duration;
use ringline::{Call, CallRepository, DomainError};

pub struct UsageAccountant {
    calls: Arc<dyn CallRepository>,
}

impl UsageAccountant {
    pub fn new(calls: Arc<dyn CallRepository>) -> Self {
        Self { calls }
    }

    /// Charge `call` for `duration_secs`.
    ///
    /// The caller must hold the call's guard. The billed call and the debit
    /// are committed together; on error neither is stored and the call stays
    /// unbilled. Returns the persisted call and the credits charged, or the
    /// call as given and `None` when it was already billed.
    pub async fn settle(
        &self,
        mut call: Call,
        duration_secs: i32,
    ) -> Result<(Call, Option<i32>), DomainError> {
        if call.is_billed() {
            tracing::debug!(call_id = %call.id, "Usage already settled, ignoring duration report");
            return Ok((call, None));
        }

        let credits = credits_for_duration(duration_secs);
        call.duration_secs = duration_secs.max(0);
        call.credits_charged = call.credits_charged.max(credits);
        call.billed_at = Some(Utc::now());

        let (call, account) = self.calls.charge(&call, credits).await?;

        if credits > 0 {
            tracing::info!(
                call_id = %call.id,
                account_id = %account.id,
                credits,
                balance = account.credits,
                "Charged call usage"
            );
        } else {
            tracing::info!(call_id = %call.id, "Call used no billable time");
        }

        Ok((call, Some(credits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryAccountRepository, InMemoryCallRepository};
    use ringline::{Account, AccountRepository, PhoneNumber};

    async fn setup(
        credits: i32,
    ) -> (
        UsageAccountant,
        Arc<InMemoryCallRepository>,
        Arc<InMemoryAccountRepository>,
        Call,
    ) {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let calls = Arc::new(InMemoryCallRepository::new(accounts.clone()));
        let account = accounts
            .insert(&Account::new("Acme".to_string(), Some(credits)))
            .await
            .unwrap();
        let call = calls
            .insert(&Call::new(
                account.id,
                PhoneNumber::parse("5551234567").unwrap(),
                None,
                None,
                None,
            ))
            .await
            .unwrap();
        (UsageAccountant::new(calls.clone()), calls, accounts, call)
    }

    #[tokio::test]
    async fn test_settles_once() {
        let (accountant, _, accounts, call) = setup(1000).await;

        let (billed, credits) = accountant.settle(call, 125).await.unwrap();
        assert_eq!(credits, Some(3));
        assert_eq!(billed.duration_secs, 125);
        assert_eq!(billed.credits_charged, 3);
        assert!(billed.is_billed());

        let (again, credits) = accountant.settle(billed.clone(), 600).await.unwrap();
        assert_eq!(credits, None);
        assert_eq!(again.credits_charged, 3);
        assert_eq!(again.duration_secs, 125);

        let account = accounts.find_by_id(billed.owner_id).await.unwrap().unwrap();
        assert_eq!(account.credits, 997);
    }

    #[tokio::test]
    async fn test_zero_duration_charges_nothing() {
        let (accountant, _, accounts, call) = setup(0).await;
        let (billed, credits) = accountant.settle(call, 0).await.unwrap();
        assert_eq!(credits, Some(0));
        assert!(billed.is_billed());

        let account = accounts.find_by_id(billed.owner_id).await.unwrap().unwrap();
        assert_eq!(account.credits, 0);
    }

    #[tokio::test]
    async fn test_lost_race_neither_bills_nor_debits() {
        let (accountant, calls, accounts, call) = setup(1000).await;
        // Someone else saved the call after we loaded it
        calls.update(&call).await.unwrap();

        let err = accountant.settle(call.clone(), 125).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let stored = calls.find_by_id(call.id).await.unwrap().unwrap();
        assert!(!stored.is_billed());
        assert_eq!(stored.credits_charged, 0);
        let account = accounts.find_by_id(call.owner_id).await.unwrap().unwrap();
        assert_eq!(account.credits, 1000);
    }
}
