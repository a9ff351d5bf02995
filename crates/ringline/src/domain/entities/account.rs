//! Account - Owner of calls and holder of the credit balance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_CREDITS: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    /// Remaining credits; never negative
    pub credits: i32,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(name: String, credits: Option<i32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            credits: credits.unwrap_or(DEFAULT_CREDITS).max(0),
            created_at: Utc::now(),
        }
    }

    /// Balance after debiting `amount`, clamped at zero
    pub fn balance_after(&self, amount: i32) -> i32 {
        self.credits.saturating_sub(amount.max(0)).max(0)
    }
}
