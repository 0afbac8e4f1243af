//! Session record API handlers: read, delete, and post-session summary.

use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tandem_advice::summary_prompt;
use tandem_db::{SessionRecord, StoreError};
use tandem_types::TranscriptEntry;

use crate::middleware::AuthContext;
use crate::AppState;

pub(crate) fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::SessionNotFound(_) | StoreError::CounterpartNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Loads a session record and enforces ownership. A record belonging to a
/// different user is reported as not found, not forbidden, so record IDs
/// cannot be probed.
async fn load_owned_session(
    state: &Arc<AppState>,
    record_id: String,
    user_id: &str,
) -> Result<SessionRecord, StatusCode> {
    let pool = state.pool.clone();
    let record = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::get_session(&conn, &record_id).map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("session lookup task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    if record.user_id != user_id {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(record)
}

/// `GET /api/sessions/{recordId}` — returns the caller's session record.
pub async fn get_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
    Path(record_id): Path<String>,
) -> Result<Json<SessionRecord>, StatusCode> {
    let record = load_owned_session(&state, record_id, &user.user_id).await?;
    Ok(Json(record))
}

/// `DELETE /api/sessions/{recordId}` — deletes the caller's session record.
/// Transcripts and advice cascade with it.
pub async fn delete_session_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
    Path(record_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let pool = state.pool.clone();
    let user_id = user.user_id.clone();

    let deleted = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::delete_session(&conn, &record_id, &user_id).map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("session delete task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub record_id: String,
}

/// `POST /api/summarize` — loads the full transcript of a finished session,
/// asks the LLM for a Markdown digest, stores it on the session row, and
/// returns it.
pub async fn summarize_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let record = load_owned_session(&state, request.record_id.clone(), &user.user_id).await?;

    let pool = state.pool.clone();
    let record_id = record.id.clone();
    let rows = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::list_transcripts(&conn, &record_id).map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("transcript load task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    if rows.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let transcript: Vec<TranscriptEntry> = rows
        .into_iter()
        .map(|row| TranscriptEntry {
            speaker: row.speaker,
            text: row.content,
        })
        .collect();

    let summary = state
        .advice
        .generate(&summary_prompt(&transcript))
        .await
        .map_err(|e| {
            tracing::error!(record_id = %record.id, "summary generation failed: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    let pool = state.pool.clone();
    let record_id = record.id.clone();
    let stored = summary.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::update_session_summary(&conn, &record_id, &stored).map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("summary store task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(serde_json::json!({
        "record_id": record.id,
        "summary": summary,
    })))
}
