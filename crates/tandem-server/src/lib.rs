//! Tandem server library logic.

pub mod api_counterparts;
pub mod api_meetings;
pub mod api_relay;
pub mod api_sessions;
pub mod config;
pub mod identity;
pub mod middleware;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use identity::IdentityVerifier;
use serde_json::{json, Value};
use std::sync::Arc;
use tandem_advice::AdviceClient;
use tandem_db::DbPool;
use tandem_relay::SessionRegistry;
use tandem_stt::{LiveSttConfig, RawPcmFormat};
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// In-memory registry of live sessions and their observers.
    pub registry: SessionRegistry,
    /// Bearer token verifier backed by the external identity provider.
    pub identity: IdentityVerifier,
    /// Advice LLM client.
    pub advice: AdviceClient,
    /// Streaming STT service settings.
    pub stt: config::SttConfig,
    /// Meeting-bot provider settings.
    pub bot: config::BotConfig,
    /// Externally reachable base URL of this server.
    pub public_url: String,
    /// Shared HTTP client for outbound provider calls.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(pool: DbPool, config: &config::Config) -> Self {
        Self {
            pool,
            registry: SessionRegistry::new(),
            identity: IdentityVerifier::new(config.auth.url.clone()),
            advice: AdviceClient::new(
                config.advice.url.clone(),
                config.advice.api_key.clone(),
                config.advice.model.clone(),
            ),
            stt: config.stt.clone(),
            bot: config.bot.clone(),
            public_url: config.public_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Builds the per-connection STT session configuration. Raw PCM
    /// parameters are set only for headerless bot audio; browser audio is
    /// self-describing and the upstream auto-detects it.
    pub fn live_stt_config(&self, raw_pcm: Option<RawPcmFormat>) -> LiveSttConfig {
        LiveSttConfig {
            url: self.stt.url.clone(),
            api_key: self.stt.api_key.clone(),
            model: self.stt.model.clone(),
            language: self.stt.language.clone(),
            smart_format: true,
            diarize: true,
            raw_pcm,
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/api/sessions/{recordId}",
            get(api_sessions::get_session_handler).delete(api_sessions::delete_session_handler),
        )
        .route(
            "/api/counterparts",
            get(api_counterparts::list_counterparts_handler)
                .post(api_counterparts::create_counterpart_handler),
        )
        .route("/api/summarize", post(api_sessions::summarize_handler))
        .route("/api/meetings/join", post(api_meetings::join_meeting_handler))
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .route("/ws/client/{sessionKey}", get(api_relay::client_ws_handler))
        .route("/ws/bot/{sessionKey}", get(api_relay::bot_ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(state))
}
