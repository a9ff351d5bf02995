//! PostgreSQL implementation of CallRepository

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use ringline::{
    Account, Call, CallEvent, CallEventKind, CallRepository, CallStatus, CallTurn, DomainError,
};

use super::account_repository::AccountRow;

/// PostgreSQL implementation of CallRepository
pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Version-checked write of the mutable call columns; `None` when no row matched
    async fn write_call<'e, E>(executor: E, call: &Call) -> Result<Option<CallRow>, DomainError>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query_as::<_, CallRow>(&format!(
            r#"
            UPDATE calls
            SET gateway_call_ref = $3, status = $4, duration_secs = $5, conversation = $6,
                ended_at = $7, credits_charged = $8, billed_at = $9, version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {CALL_COLUMNS}
            "#
        ))
        .bind(call.id)
        .bind(call.version)
        .bind(&call.gateway_call_ref)
        .bind(call.status.as_str())
        .bind(call.duration_secs)
        .bind(Json(&call.conversation))
        .bind(call.ended_at)
        .bind(call.credits_charged)
        .bind(call.billed_at)
        .fetch_optional(executor)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))
    }

    /// Why `write_call` matched nothing: a stale version or a missing call
    async fn unmatched(&self, call: &Call) -> DomainError {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM calls WHERE id = $1)")
            .bind(call.id)
            .fetch_one(&self.pool)
            .await;

        match exists {
            Ok(true) => DomainError::Conflict(format!(
                "call {} was modified concurrently (expected version {})",
                call.id, call.version
            )),
            Ok(false) => DomainError::not_found("Call", call.id),
            Err(e) => DomainError::Repository(e.to_string()),
        }
    }
}

/// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct CallRow {
    id: Uuid,
    owner_id: Uuid,
    phone_number: String,
    gateway_call_ref: Option<String>,
    status: String,
    duration_secs: i32,
    model: String,
    voice: String,
    objective: String,
    conversation: Json<Vec<CallTurn>>,
    started_at: chrono::DateTime<chrono::Utc>,
    ended_at: Option<chrono::DateTime<chrono::Utc>>,
    credits_charged: i32,
    billed_at: Option<chrono::DateTime<chrono::Utc>>,
    version: i32,
}

impl TryFrom<CallRow> for Call {
    type Error = DomainError;

    fn try_from(row: CallRow) -> Result<Self, Self::Error> {
        let status: CallStatus = row
            .status
            .parse()
            .map_err(|e: String| DomainError::Repository(format!("call {}: {e}", row.id)))?;

        Ok(Self {
            id: row.id,
            owner_id: row.owner_id,
            phone_number: row.phone_number,
            gateway_call_ref: row.gateway_call_ref,
            status,
            duration_secs: row.duration_secs,
            model: row.model,
            voice: row.voice,
            objective: row.objective,
            conversation: row.conversation.0,
            started_at: row.started_at,
            ended_at: row.ended_at,
            credits_charged: row.credits_charged,
            billed_at: row.billed_at,
            version: row.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CallEventRow {
    id: Uuid,
    call_id: Uuid,
    payload: Json<CallEventKind>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<CallEventRow> for CallEvent {
    fn from(row: CallEventRow) -> Self {
        Self {
            id: row.id,
            call_id: row.call_id,
            event: row.payload.0,
            created_at: row.created_at,
        }
    }
}

fn into_calls(rows: Vec<CallRow>) -> Result<Vec<Call>, DomainError> {
    rows.into_iter().map(Call::try_from).collect()
}

const CALL_COLUMNS: &str = "id, owner_id, phone_number, gateway_call_ref, status, duration_secs, \
     model, voice, objective, conversation, started_at, ended_at, credits_charged, billed_at, version";

#[async_trait]
impl CallRepository for PgCallRepository {
    async fn insert(&self, call: &Call) -> Result<Call, DomainError> {
        let row = sqlx::query_as::<_, CallRow>(&format!(
            r#"
            INSERT INTO calls (id, owner_id, phone_number, gateway_call_ref, status, duration_secs,
                               model, voice, objective, conversation, started_at, ended_at,
                               credits_charged, billed_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {CALL_COLUMNS}
            "#
        ))
        .bind(call.id)
        .bind(call.owner_id)
        .bind(&call.phone_number)
        .bind(&call.gateway_call_ref)
        .bind(call.status.as_str())
        .bind(call.duration_secs)
        .bind(&call.model)
        .bind(&call.voice)
        .bind(&call.objective)
        .bind(Json(&call.conversation))
        .bind(call.started_at)
        .bind(call.ended_at)
        .bind(call.credits_charged)
        .bind(call.billed_at)
        .bind(call.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        let row = sqlx::query_as::<_, CallRow>(&format!(
            "SELECT {CALL_COLUMNS} FROM calls WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        row.map(Call::try_from).transpose()
    }

    async fn update(&self, call: &Call) -> Result<Call, DomainError> {
        match Self::write_call(&self.pool, call).await? {
            Some(row) => row.try_into(),
            None => Err(self.unmatched(call).await),
        }
    }

    async fn charge(&self, call: &Call, credits: i32) -> Result<(Call, Account), DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        let Some(row) = Self::write_call(&mut *tx, call).await? else {
            drop(tx);
            return Err(self.unmatched(call).await);
        };

        // GREATEST keeps the balance at zero rather than failing the CHECK constraint
        let account = sqlx::query_as::<_, AccountRow>(
            r#"
            UPDATE accounts
            SET credits = GREATEST(credits - $2, 0)
            WHERE id = $1
            RETURNING id, name, credits, created_at
            "#,
        )
        .bind(call.owner_id)
        .bind(credits.max(0))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?
        .ok_or_else(|| DomainError::not_found("Account", call.owner_id))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok((row.try_into()?, account.into()))
    }

    async fn find_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Call>, DomainError> {
        let rows = sqlx::query_as::<_, CallRow>(&format!(
            "SELECT {CALL_COLUMNS} FROM calls WHERE owner_id = $1 ORDER BY started_at DESC LIMIT $2"
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        into_calls(rows)
    }

    async fn find_active(&self, owner_id: Uuid) -> Result<Vec<Call>, DomainError> {
        let rows = sqlx::query_as::<_, CallRow>(&format!(
            r#"
            SELECT {CALL_COLUMNS} FROM calls
            WHERE owner_id = $1 AND status IN ('initiated', 'ringing', 'in-progress')
            ORDER BY started_at DESC
            "#
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        into_calls(rows)
    }

    async fn append_event(&self, event: &CallEvent) -> Result<CallEvent, DomainError> {
        let row = sqlx::query_as::<_, CallEventRow>(
            r#"
            INSERT INTO call_events (id, call_id, event_type, payload, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, call_id, payload, created_at
            "#,
        )
        .bind(event.id)
        .bind(event.call_id)
        .bind(event.kind())
        .bind(Json(&event.event))
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(row.into())
    }

    async fn find_events(&self, call_id: Uuid) -> Result<Vec<CallEvent>, DomainError> {
        let rows = sqlx::query_as::<_, CallEventRow>(
            r#"
            SELECT id, call_id, payload, created_at
            FROM call_events
            WHERE call_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::Repository(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
