//! Counterpart profile API handlers.
//!
//! A counterpart is the person a session's coaching is about; its free-text
//! personality notes bias the advice prompts for sessions that reference it.

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use tandem_db::{Counterpart, NewCounterpart};

use crate::api_sessions::store_status;
use crate::middleware::AuthContext;
use crate::AppState;

/// `GET /api/counterparts` — lists the caller's counterpart profiles.
pub async fn list_counterparts_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
) -> Result<Json<Vec<Counterpart>>, StatusCode> {
    let pool = state.pool.clone();
    let user_id = user.user_id.clone();

    let counterparts = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::list_counterparts(&conn, &user_id).map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("counterpart list task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok(Json(counterparts))
}

#[derive(Debug, Deserialize)]
pub struct CreateCounterpartRequest {
    pub name: String,
    pub department: Option<String>,
    pub personality_notes: Option<String>,
}

/// `POST /api/counterparts` — creates a counterpart profile for the caller.
pub async fn create_counterpart_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(AuthContext(user)): Extension<AuthContext>,
    Json(request): Json<CreateCounterpartRequest>,
) -> Result<(StatusCode, Json<Counterpart>), StatusCode> {
    if request.name.trim().is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let pool = state.pool.clone();
    let counterpart = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| {
            tracing::error!("failed to get db connection: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        tandem_db::create_counterpart(
            &conn,
            &NewCounterpart {
                user_id: &user.user_id,
                organization_id: &user.organization_id,
                name: request.name.trim(),
                department: request.department.as_deref(),
                personality_notes: request.personality_notes.as_deref(),
            },
        )
        .map_err(|e| store_status(&e))
    })
    .await
    .map_err(|e| {
        tracing::error!("counterpart create task failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })??;

    Ok((StatusCode::CREATED, Json(counterpart)))
}
