use axum::{middleware, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod adapters;
mod application;
mod auth;
mod config;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod testing;

use adapters::{
    InMemoryAccountRepository, InMemoryCallRepository, OpenAiProvider, PgAccountRepository,
    PgCallRepository, TwilioGateway, UnconfiguredProvider,
};
use application::{AccountService, CallOrchestrator};
use config::{ServerConfig, StorageBackend};
use ringline::{AccountRepository, CallRepository, ConversationAgent, LlmProvider, TelephonyGateway};
use services::CallbackSigner;

/// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<CallOrchestrator>,
    pub account_service: Arc<AccountService>,
    /// Renders callback responses into the gateway's markup
    pub gateway: Arc<dyn TelephonyGateway>,
    pub signer: Arc<CallbackSigner>,
}

#[derive(Serialize)]
struct HealthCheck {
    status: String,
    message: String,
    version: String,
}

async fn health_check() -> Json<HealthCheck> {
    Json(HealthCheck {
        status: "ok".to_string(),
        message: "Ringline API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Full HTTP surface: docs, health, gateway callbacks and the protected API
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        .merge(routes::accounts::router())
        .merge(routes::calls::router())
        .merge(routes::numbers::router())
        .merge(routes::diagnostics::router())
        .layer(middleware::from_fn(auth::auth_middleware));

    // OpenAPI documentation
    let openapi = routes::swagger::ApiDoc::openapi();

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .route("/health", get(health_check))
        .merge(routes::gateway::router())
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[shuttle_runtime::main]
async fn main(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secrets: shuttle_runtime::SecretStore,
) -> shuttle_axum::ShuttleAxum {
    tracing::info!("📞 Ringline API initializing...");

    let config = ServerConfig::from_lookup(|key| secrets.get(key))
        .map_err(|e| shuttle_runtime::Error::Custom(anyhow::Error::new(e)))?;

    // Initialize API key from secrets
    if let Some(api_key) = config.api_key.clone() {
        auth::init_api_key(api_key);
        tracing::info!("🔐 API key authentication enabled");
    } else {
        tracing::warn!("⚠️  No RINGLINE_API_KEY set - authentication disabled");
    }

    if config.callback_secret.is_none() {
        tracing::warn!("⚠️  No CALLBACK_SECRET set - gateway callbacks are not signed");
    }

    let (calls, accounts): (Arc<dyn CallRepository>, Arc<dyn AccountRepository>) =
        match config.storage {
            StorageBackend::Postgres => {
                sqlx::migrate!()
                    .run(&pool)
                    .await
                    .map_err(|e| shuttle_runtime::Error::Custom(anyhow::Error::new(e)))?;
                tracing::info!("✅ Database migrations completed");
                (
                    Arc::new(PgCallRepository::new(pool.clone())) as Arc<dyn CallRepository>,
                    Arc::new(PgAccountRepository::new(pool)) as Arc<dyn AccountRepository>,
                )
            }
            StorageBackend::Memory => {
                tracing::warn!("⚠️  STORAGE=memory - call records are lost on restart");
                let accounts = Arc::new(InMemoryAccountRepository::new());
                (
                    Arc::new(InMemoryCallRepository::new(accounts.clone())) as Arc<dyn CallRepository>,
                    accounts as Arc<dyn AccountRepository>,
                )
            }
        };

    let provider: Arc<dyn LlmProvider> = match config.openai.api_key.clone() {
        Some(key) => {
            tracing::info!("🧠 OpenAI provider initialized");
            Arc::new(OpenAiProvider::new(
                key,
                &config.openai.base_url,
                config.llm_timeout,
            ))
        }
        None => {
            tracing::warn!("⚠️  No OPENAI_API_KEY set - agent runs on fallback lines only");
            Arc::new(UnconfiguredProvider)
        }
    };

    let gateway: Arc<dyn TelephonyGateway> =
        Arc::new(TwilioGateway::new(&config.twilio, config.gateway_timeout));
    tracing::info!(gateway = gateway.name(), from = %config.twilio.from_number, "☎️  Telephony gateway initialized");

    let signer = Arc::new(CallbackSigner::new(
        config.public_base_url.clone(),
        config.callback_secret.clone(),
    ));

    let agent = ConversationAgent::new(provider, config.llm_timeout);
    tracing::info!(provider = agent.provider_name(), "🗣️  Conversation agent ready");

    let orchestrator = Arc::new(CallOrchestrator::new(
        calls,
        accounts.clone(),
        gateway.clone(),
        agent,
        signer.clone(),
        config.gateway_timeout,
    ));

    let state = AppState {
        orchestrator,
        account_service: Arc::new(AccountService::new(accounts)),
        gateway,
        signer,
    };

    let router = build_router(state);

    tracing::info!("📚 Swagger UI: /swagger-ui");
    tracing::info!(callbacks = %config.public_base_url, "✅ Ringline API ready");

    Ok(router.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let harness = testing::Harness::new().await;
        let response = build_router(harness.state.clone())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
