//! WebSocket relay handlers: the per-connection loop that wires a live
//! audio source to the transcription bridge, the session registry, and the
//! advice pipeline.

use axum::{
    extract::{
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket},
        Extension, Path, Query, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tandem_advice::{advice_prompt, ADVICE_CONTEXT_WINDOW};
use tandem_db::NewSession;
use tandem_stt::{LiveSttSession, RawPcmFormat, Utterance};
use tandem_types::{AuthenticatedUser, SessionMode};
use tokio::sync::mpsc;

/// Close code sent when token verification fails on a client connection.
const AUTH_FAILURE_CLOSE_CODE: u16 = 4001;

/// Capacity of the per-connection outbound message queue. Beyond this the
/// observer is too slow and broadcasts to it are dropped.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

use crate::AppState;

/// Query parameters for a browser client connection.
#[derive(Debug, Deserialize)]
pub struct ClientConnectParams {
    pub token: Option<String>,
    /// `mic` ingests audio and creates a session record; `view` (the
    /// default) only observes.
    pub mode: Option<String>,
    /// Counterpart profile to bias advice for this session, if any.
    pub counterpart: Option<String>,
}

/// Query parameters for a meeting-bot connection.
#[derive(Debug, Deserialize)]
pub struct BotConnectParams {
    /// Durable session record id, created at dispatch time.
    pub record: Option<String>,
}

/// What kind of audio source sits on the other end of the socket.
enum AudioSource {
    /// Browser microphone: self-describing encoded audio, record created
    /// on connect.
    Mic {
        user: AuthenticatedUser,
        counterpart_id: Option<String>,
    },
    /// Observer only; never sends audio.
    View,
    /// Meeting bot: raw 16 kHz mono linear16 PCM, record id from the
    /// query string.
    Bot { record_id: String },
}

impl AudioSource {
    fn ingests_audio(&self) -> bool {
        !matches!(self, AudioSource::View)
    }

    fn raw_pcm(&self) -> Option<RawPcmFormat> {
        match self {
            AudioSource::Bot { .. } => Some(RawPcmFormat::linear16_16khz_mono()),
            _ => None,
        }
    }
}

/// WebSocket handler: `GET /ws/client/{sessionKey}?token=…&mode=mic|view`.
///
/// The token is verified after the upgrade so the failure can be reported
/// as a close frame with a policy code instead of an opaque HTTP rejection.
pub async fn client_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_key): Path<String>,
    Query(params): Query<ClientConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_socket(socket, state, session_key, params))
}

async fn client_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    session_key: String,
    params: ClientConnectParams,
) {
    let token = params.token.unwrap_or_default();
    let Some(user) = state.identity.verify(&token).await else {
        tracing::warn!(session_key = %session_key, "client websocket auth failed");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: AUTH_FAILURE_CLOSE_CODE,
                reason: Utf8Bytes::from_static("invalid token"),
            })))
            .await;
        return;
    };

    let source = match params.mode.as_deref() {
        Some("mic") => AudioSource::Mic {
            user,
            counterpart_id: params.counterpart,
        },
        Some("view") | None => AudioSource::View,
        Some(other) => {
            tracing::warn!(session_key = %session_key, mode = other, "unsupported client mode");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: 1008,
                    reason: Utf8Bytes::from_static("unsupported mode"),
                })))
                .await;
            return;
        }
    };

    handle_relay(socket, state, session_key, source).await;
}

/// WebSocket handler: `GET /ws/bot/{sessionKey}?record=…`.
///
/// Bots are pre-authorized at dispatch time; the record id issued then is
/// their credential. A connection without one is refused outright.
pub async fn bot_ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(session_key): Path<String>,
    Query(params): Query<BotConnectParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(record_id) = params.record.filter(|r| !r.is_empty()) else {
        tracing::warn!(session_key = %session_key, "bot websocket connect missing record id");
        return StatusCode::BAD_REQUEST.into_response();
    };

    ws.on_upgrade(move |socket| {
        handle_relay(socket, state, session_key, AudioSource::Bot { record_id })
    })
    .into_response()
}

/// The per-connection relay loop.
///
/// Joins the registry, resolves the durable record, starts the
/// transcription bridge for audio-bearing sources, forwards inbound binary
/// frames to it, and on every exit path finishes the bridge before leaving
/// the registry — in that order, so no audio source outlives its upstream
/// session.
async fn handle_relay(
    socket: WebSocket,
    state: Arc<AppState>,
    session_key: String,
    source: AudioSource,
) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

    let observer_id = state.registry.join(&session_key, tx.clone()).await;

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let record_id = resolve_record(&state, &session_key, &source, &tx).await;

    // Audio-bearing sources get an upstream STT session plus a pump task
    // that turns recognized utterances into broadcasts, persistence, and
    // advice triggers. A start failure aborts this relay and nothing else.
    let stt_session = if source.ingests_audio() {
        let config = state.live_stt_config(source.raw_pcm());
        match LiveSttSession::start(&config).await {
            Ok((session, utterances)) => {
                tokio::spawn(pump_utterances(
                    state.clone(),
                    session_key.clone(),
                    record_id.clone(),
                    utterances,
                ));
                Some(session)
            }
            Err(e) => {
                tracing::error!(
                    session_key = %session_key,
                    "failed to start transcription session, aborting relay: {}",
                    e
                );
                state.registry.leave(&session_key, observer_id).await;
                send_task.abort();
                return;
            }
        }
    } else {
        None
    };

    tracing::info!(
        session_key = %session_key,
        %observer_id,
        ingests_audio = stt_session.is_some(),
        "relay connection established"
    );

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(frame) => {
                if let Some(session) = &stt_session {
                    if let Err(e) = session.send(frame.to_vec()).await {
                        tracing::debug!(
                            session_key = %session_key,
                            "transcription session gone, ending relay: {}",
                            e
                        );
                        break;
                    }
                }
            }
            Message::Close(_) => break,
            // Text and ping/pong frames carry no relay semantics.
            _ => {}
        }
    }

    if let Some(session) = &stt_session {
        session.finish().await;
    }
    state.registry.leave(&session_key, observer_id).await;
    send_task.abort();

    tracing::info!(session_key = %session_key, %observer_id, "relay connection closed");
}

/// Resolves the durable session record for this connection.
///
/// Mic sources create one and announce its id over the socket; bot sources
/// carry one from dispatch and inherit its counterpart association; view
/// sources have none. Persistence failures degrade to a record-less relay
/// rather than tearing the connection down.
async fn resolve_record(
    state: &Arc<AppState>,
    session_key: &str,
    source: &AudioSource,
    tx: &mpsc::Sender<String>,
) -> Option<String> {
    match source {
        AudioSource::Mic {
            user,
            counterpart_id,
        } => {
            if let Some(cp) = counterpart_id {
                state.registry.set_counterpart(session_key, cp.clone()).await;
            }

            let pool = state.pool.clone();
            let user = user.clone();
            let cp = counterpart_id.clone();
            let created = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| e.to_string())?;
                tandem_db::create_session(
                    &conn,
                    &NewSession {
                        user_id: &user.user_id,
                        organization_id: &user.organization_id,
                        mode: SessionMode::Mic,
                        counterpart_id: cp.as_deref(),
                    },
                )
                .map_err(|e| e.to_string())
            })
            .await;

            match created {
                Ok(Ok(id)) => {
                    let announce = json!({"type": "session_record", "id": id}).to_string();
                    if let Err(e) = tx.try_send(announce) {
                        tracing::warn!(session_key, "failed to announce session record: {}", e);
                    }
                    Some(id)
                }
                Ok(Err(e)) => {
                    tracing::error!(session_key, "failed to create session record: {}", e);
                    None
                }
                Err(e) => {
                    tracing::error!(session_key, "session record task failed: {}", e);
                    None
                }
            }
        }
        AudioSource::Bot { record_id } => {
            // The dispatched record may reference a counterpart; load it so
            // advice for this session picks up the personality notes. A
            // lookup failure costs only the enrichment.
            let pool = state.pool.clone();
            let rid = record_id.clone();
            let loaded = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| e.to_string())?;
                tandem_db::get_session(&conn, &rid).map_err(|e| e.to_string())
            })
            .await;

            match loaded {
                Ok(Ok(record)) => {
                    if let Some(cp) = record.counterpart_id {
                        state.registry.set_counterpart(session_key, cp).await;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(session_key, %record_id, "session record lookup failed: {}", e);
                }
                Err(e) => {
                    tracing::warn!(session_key, %record_id, "record lookup task failed: {}", e);
                }
            }

            Some(record_id.clone())
        }
        AudioSource::View => None,
    }
}

/// Consumes recognized utterances for one audio source until its upstream
/// stream ends.
///
/// Per utterance: append to the in-memory buffer, broadcast to every
/// observer, persist in the background, and run the advice gate — spawning
/// the generation pipeline only when a window fires.
async fn pump_utterances(
    state: Arc<AppState>,
    session_key: String,
    record_id: Option<String>,
    mut utterances: mpsc::Receiver<Utterance>,
) {
    while let Some(utterance) = utterances.recv().await {
        state
            .registry
            .append_transcript(&session_key, utterance.speaker, &utterance.text)
            .await;

        let frame = json!({
            "type": "transcript",
            "speaker": utterance.speaker,
            "text": utterance.text,
        })
        .to_string();
        state.registry.broadcast(&session_key, frame).await;

        if let Some(record_id) = record_id.clone() {
            let pool = state.pool.clone();
            let speaker = utterance.speaker;
            let text = utterance.text.clone();
            tokio::task::spawn_blocking(move || match pool.get() {
                Ok(conn) => {
                    if let Err(e) = tandem_db::append_transcript(&conn, &record_id, speaker, &text)
                    {
                        tracing::warn!(record_id = %record_id, "transcript persist failed: {}", e);
                    }
                }
                Err(e) => {
                    tracing::warn!("failed to get db connection for transcript persist: {}", e);
                }
            });
        }

        if state.registry.maybe_trigger_advice(&session_key).await {
            tokio::spawn(run_advice_pipeline(
                state.clone(),
                session_key.clone(),
                record_id.clone(),
            ));
        }
    }

    tracing::debug!(session_key = %session_key, "utterance stream ended");
}

/// One advice generation run, detached from the relay loop.
///
/// Every failure here is logged and swallowed: a missed advice window must
/// never disturb transcription or broadcasting.
async fn run_advice_pipeline(
    state: Arc<AppState>,
    session_key: String,
    record_id: Option<String>,
) {
    let context = state
        .registry
        .recent_context(&session_key, ADVICE_CONTEXT_WINDOW)
        .await;
    if context.is_empty() {
        return;
    }

    let notes = match state.registry.counterpart(&session_key).await {
        Some(counterpart_id) => {
            let pool = state.pool.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| e.to_string())?;
                tandem_db::get_counterpart(&conn, &counterpart_id).map_err(|e| e.to_string())
            })
            .await;

            match result {
                Ok(Ok(counterpart)) => counterpart.personality_notes,
                Ok(Err(e)) => {
                    tracing::warn!(session_key = %session_key, "counterpart lookup failed: {}", e);
                    None
                }
                Err(e) => {
                    tracing::warn!(session_key = %session_key, "counterpart task failed: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let prompt = advice_prompt(&context, notes.as_deref());
    let advice = match state.advice.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(session_key = %session_key, "advice generation failed: {}", e);
            return;
        }
    };

    let frame = json!({"type": "advice", "content": advice}).to_string();
    state.registry.broadcast(&session_key, frame).await;

    if let Some(record_id) = record_id {
        let pool = state.pool.clone();
        tokio::task::spawn_blocking(move || match pool.get() {
            Ok(conn) => {
                if let Err(e) = tandem_db::append_advice(&conn, &record_id, &advice) {
                    tracing::warn!(record_id = %record_id, "advice persist failed: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("failed to get db connection for advice persist: {}", e);
            }
        });
    }
}
