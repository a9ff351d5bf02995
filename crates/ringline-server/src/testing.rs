//! Test doubles and a wired-up application for unit and route tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use ringline::{
    Account, AccountRepository, Call, CallEvent, CallRepository, ChatMessage, CompletionOptions,
    CompletionResponse, ConversationAgent, DomainError, LlmProvider, OriginNumber, PlaceCall,
    PlacedCall, TelephonyGateway, TokenUsage, VoiceResponse,
};

use crate::adapters::twilio::render_twiml;
use crate::adapters::{InMemoryAccountRepository, InMemoryCallRepository};
use crate::application::{AccountService, CallOrchestrator};
use crate::services::CallbackSigner;
use crate::AppState;

pub const CALLBACK_SECRET: &str = "test-secret";
pub const BASE_URL: &str = "http://ringline.test";
pub const LISTEN_REPLY: &str =
    r#"{"message":"Sure, tell me more.","shouldContinue":true,"nextAction":"listen"}"#;
pub const GOODBYE_REPLY: &str =
    r#"{"message":"Thanks, goodbye!","shouldContinue":false,"nextAction":"hangup"}"#;

/// Gateway that accepts or rejects placements and records what it was asked
#[derive(Default)]
pub struct ScriptedGateway {
    pub reject_placement: bool,
    pub fail_end: bool,
    pub placed: Mutex<Vec<PlaceCall>>,
    pub ended: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn rejecting() -> Self {
        Self {
            reject_placement: true,
            ..Self::default()
        }
    }

    pub fn failing_end() -> Self {
        Self {
            fail_end: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TelephonyGateway for ScriptedGateway {
    async fn place_call(&self, request: &PlaceCall) -> Result<PlacedCall, DomainError> {
        self.placed.lock().unwrap().push(request.clone());
        if self.reject_placement {
            return Err(DomainError::ExternalService(
                "The 'To' number is not a valid phone number".to_string(),
            ));
        }
        Ok(PlacedCall {
            gateway_ref: format!("CA{}", Uuid::new_v4().simple()),
            status: "queued".to_string(),
        })
    }

    async fn end_call(&self, gateway_ref: &str) -> Result<(), DomainError> {
        self.ended.lock().unwrap().push(gateway_ref.to_string());
        if self.fail_end {
            return Err(DomainError::ExternalService("call not found".to_string()));
        }
        Ok(())
    }

    async fn list_numbers(&self) -> Result<Vec<OriginNumber>, DomainError> {
        Ok(vec![OriginNumber {
            phone_number: "+15005550006".to_string(),
            friendly_name: "Test line".to_string(),
        }])
    }

    fn render(&self, response: &VoiceResponse) -> String {
        render_twiml(response, "alice")
    }

    fn content_type(&self) -> &'static str {
        "text/xml"
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Provider with a fixed opening line and a queue of turn replies.
///
/// Opening requests (plain text mode) get `opening`; structured requests pop
/// `turns`, answering `LISTEN_REPLY` once the queue is empty.
pub struct ScriptedProvider {
    pub opening: Result<String, String>,
    pub turns: Mutex<VecDeque<Result<String, String>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            opening: Ok("Hi, this is Ringline calling about your appointment.".to_string()),
            turns: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedProvider {
    pub fn with_turns<I, S>(turns: I) -> Self
    where
        I: IntoIterator<Item = Result<S, S>>,
        S: Into<String>,
    {
        let turns: VecDeque<Result<String, String>> = turns
            .into_iter()
            .map(|t| t.map(Into::into).map_err(Into::into))
            .collect();
        Self {
            turns: Mutex::new(turns),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            opening: Err("provider down".to_string()),
            turns: Mutex::new(VecDeque::from(vec![Err("provider down".to_string()); 8])),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Structured (turn) requests seen so far
    pub fn turn_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<CompletionResponse, DomainError> {
        let reply = if options.json_response {
            self.requests.lock().unwrap().push(messages.to_vec());
            self.turns
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(LISTEN_REPLY.to_string()))
        } else {
            self.opening.clone()
        };

        reply
            .map(|content| CompletionResponse {
                content,
                model: options.model.clone().unwrap_or_default(),
                usage: TokenUsage::default(),
                finish_reason: Some("stop".to_string()),
            })
            .map_err(DomainError::ExternalService)
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "gpt-4o"
    }
}

/// In-memory call store whose writes can be switched to fail
pub struct GatedCallRepository {
    inner: Arc<InMemoryCallRepository>,
    pub fail_charges: AtomicBool,
    pub fail_updates: AtomicBool,
}

impl GatedCallRepository {
    pub fn new(inner: Arc<InMemoryCallRepository>) -> Self {
        Self {
            inner,
            fail_charges: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
        }
    }

    fn gate(flag: &AtomicBool, what: &str) -> Result<(), DomainError> {
        if flag.load(Ordering::SeqCst) {
            return Err(DomainError::Repository(format!("{what} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl CallRepository for GatedCallRepository {
    async fn insert(&self, call: &Call) -> Result<Call, DomainError> {
        self.inner.insert(call).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Call>, DomainError> {
        self.inner.find_by_id(id).await
    }

    async fn update(&self, call: &Call) -> Result<Call, DomainError> {
        Self::gate(&self.fail_updates, "call store")?;
        self.inner.update(call).await
    }

    async fn charge(&self, call: &Call, credits: i32) -> Result<(Call, Account), DomainError> {
        Self::gate(&self.fail_charges, "billing")?;
        self.inner.charge(call, credits).await
    }

    async fn find_by_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<Call>, DomainError> {
        self.inner.find_by_owner(owner_id, limit).await
    }

    async fn find_active(&self, owner_id: Uuid) -> Result<Vec<Call>, DomainError> {
        self.inner.find_active(owner_id).await
    }

    async fn append_event(&self, event: &CallEvent) -> Result<CallEvent, DomainError> {
        self.inner.append_event(event).await
    }

    async fn find_events(&self, call_id: Uuid) -> Result<Vec<CallEvent>, DomainError> {
        self.inner.find_events(call_id).await
    }
}

/// Application wired to in-memory storage and scripted remotes
pub struct Harness {
    pub state: AppState,
    pub calls: Arc<InMemoryCallRepository>,
    /// What the orchestrator writes through
    pub store: Arc<GatedCallRepository>,
    pub accounts: Arc<InMemoryAccountRepository>,
    pub gateway: Arc<ScriptedGateway>,
    pub provider: Arc<ScriptedProvider>,
    pub account: Account,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(ScriptedGateway::default(), ScriptedProvider::default()).await
    }

    pub async fn with(gateway: ScriptedGateway, provider: ScriptedProvider) -> Self {
        let accounts = Arc::new(InMemoryAccountRepository::new());
        let calls = Arc::new(InMemoryCallRepository::new(accounts.clone()));
        let store = Arc::new(GatedCallRepository::new(calls.clone()));
        let gateway = Arc::new(gateway);
        let provider = Arc::new(provider);
        let signer = Arc::new(CallbackSigner::new(
            BASE_URL,
            Some(CALLBACK_SECRET.to_string()),
        ));

        let account = accounts
            .insert(&Account::new("Acme Dental".to_string(), None))
            .await
            .unwrap();

        let orchestrator = Arc::new(CallOrchestrator::new(
            store.clone(),
            accounts.clone(),
            gateway.clone(),
            ConversationAgent::new(provider.clone(), Duration::from_secs(2)),
            signer.clone(),
            Duration::from_secs(2),
        ));

        let state = AppState {
            orchestrator,
            account_service: Arc::new(AccountService::new(accounts.clone())),
            gateway: gateway.clone(),
            signer,
        };

        Self {
            state,
            calls,
            store,
            accounts,
            gateway,
            provider,
            account,
        }
    }

    pub fn orchestrator(&self) -> &CallOrchestrator {
        &self.state.orchestrator
    }

    pub fn fail_billing(&self, failing: bool) {
        self.store.fail_charges.store(failing, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, failing: bool) {
        self.store.fail_updates.store(failing, Ordering::SeqCst);
    }

    pub async fn balance(&self) -> i32 {
        self.accounts
            .find_by_id(self.account.id)
            .await
            .unwrap()
            .unwrap()
            .credits
    }
}
