//! Meeting-bot dispatch handler.
//!
//! Creates a bot-mode session record, asks the external bot provider to
//! join the meeting, and points the bot's raw audio stream back at this
//! server's `/ws/bot/{sessionKey}` endpoint with the record id in the
//! query string.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tandem_db::NewSession;
use tandem_types::SessionMode;

use crate::api_sessions::store_status;
use crate::middleware::AuthContext;
use crate::AppState;

/// Timeout for the bot provider dispatch call.
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
pub struct JoinMeetingRequest {
    /// URL of the meeting the bot should join.
    pub meeting_url: String,
    /// Relay session key observers will connect under.
    pub session_key: String,
    /// Counterpart profile to bias advice for this session, if any.
    pub counterpart_id: Option<String>,
}

/// `POST /api/meetings/join` — dispatches a meeting bot.
pub async fn join_meeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
    Json(request): Json<JoinMeetingRequest>,
) -> Result<Json<Value>, StatusCode> {
    if request.meeting_url.trim().is_empty() || request.session_key.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    // The durable record exists before the bot does, so the bot can carry
    // its id from the very first audio frame.
    let pool = state.pool.clone();
    let counterpart_id = request.counterpart_id.clone();
    let record_id = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::create_session(
            &conn,
            &NewSession {
                user_id: &user.user_id,
                organization_id: &user.organization_id,
                mode: SessionMode::Bot,
                counterpart_id: counterpart_id.as_deref(),
            },
        )
        .map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("session create task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    let stream_url = format!(
        "{}/ws/bot/{}?record={}",
        state.public_url.trim_end_matches('/'),
        request.session_key,
        record_id
    );

    let dispatch = json!({
        "meeting_url": request.meeting_url,
        "bot_name": "Tandem Notetaker",
        "reserved": false,
        "streaming": {
            "output": stream_url,
            "audio_frequency": "16khz",
        },
    });

    let response = state
        .http
        .post(format!("{}/bots", state.bot.url.trim_end_matches('/')))
        .header("x-meeting-baas-api-key", &state.bot.api_key)
        .timeout(DISPATCH_TIMEOUT)
        .json(&dispatch)
        .send()
        .await
        .map_err(|e| {
            tracing::error!(record_id = %record_id, "bot provider unreachable: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        tracing::error!(
            record_id = %record_id,
            status = %status,
            "bot provider rejected dispatch: {}",
            body
        );
        return Err(StatusCode::BAD_GATEWAY);
    }

    tracing::info!(
        record_id = %record_id,
        session_key = %request.session_key,
        "meeting bot dispatched"
    );

    Ok(Json(json!({
        "record_id": record_id,
        "bot": body,
    })))
}
