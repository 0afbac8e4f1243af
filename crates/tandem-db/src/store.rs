//! Query helpers for session records, transcripts, advice, and counterpart
//! profiles.
//!
//! All functions take a plain `&Connection`; callers on async paths are
//! expected to wrap them in `tokio::task::spawn_blocking`. Public IDs are
//! UUIDv4 strings generated here at insert time.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tandem_types::SessionMode;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("counterpart not found: {0}")]
    CounterpartNotFound(String),
    #[error("invalid stored value: {0}")]
    InvalidValue(String),
}

/// A durable session record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionRecord {
    /// Public session record ID (UUID).
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub mode: SessionMode,
    /// Counterpart profile used to bias advice generation, if any.
    pub counterpart_id: Option<String>,
    pub title: String,
    pub summary: Option<String>,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Parameters for creating a new session record.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub user_id: &'a str,
    pub organization_id: &'a str,
    pub mode: SessionMode,
    pub counterpart_id: Option<&'a str>,
}

/// A persisted transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptRow {
    pub id: i64,
    pub session_id: String,
    pub speaker: u32,
    pub content: String,
    pub created_at: String,
}

/// A counterpart profile: the person a session's coaching is about.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Counterpart {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub name: String,
    pub department: Option<String>,
    /// Free-text personality/behavior notes used to enrich advice prompts.
    pub personality_notes: Option<String>,
    pub created_at: String,
}

/// Parameters for creating a counterpart profile.
#[derive(Debug, Clone)]
pub struct NewCounterpart<'a> {
    pub user_id: &'a str,
    pub organization_id: &'a str,
    pub name: &'a str,
    pub department: Option<&'a str>,
    pub personality_notes: Option<&'a str>,
}

/// Creates a new session record and returns its public ID.
pub fn create_session(conn: &Connection, params: &NewSession<'_>) -> Result<String, StoreError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO sessions (id, user_id, organization_id, mode, counterpart_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            id,
            params.user_id,
            params.organization_id,
            params.mode.to_string(),
            params.counterpart_id,
        ],
    )?;
    Ok(id)
}

/// Retrieves a session record by its public ID.
pub fn get_session(conn: &Connection, session_id: &str) -> Result<SessionRecord, StoreError> {
    conn.query_row(
        "SELECT id, user_id, organization_id, mode, counterpart_id, title, summary, created_at
         FROM sessions WHERE id = ?1",
        [session_id],
        map_row_to_session,
    )
    .optional()?
    .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?
}

/// Appends a transcript entry to a session.
pub fn append_transcript(
    conn: &Connection,
    session_id: &str,
    speaker: u32,
    text: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO transcripts (session_id, speaker, content) VALUES (?1, ?2, ?3)",
        params![session_id, speaker, text],
    )?;
    Ok(())
}

/// Appends an advice entry to a session.
pub fn append_advice(conn: &Connection, session_id: &str, text: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO advice (session_id, content) VALUES (?1, ?2)",
        params![session_id, text],
    )?;
    Ok(())
}

/// Lists all transcript entries for a session, in insertion order.
pub fn list_transcripts(
    conn: &Connection,
    session_id: &str,
) -> Result<Vec<TranscriptRow>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, speaker, content, created_at
         FROM transcripts WHERE session_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map([session_id], |row| {
        Ok(TranscriptRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            speaker: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut transcripts = Vec::new();
    for row in rows {
        transcripts.push(row?);
    }
    Ok(transcripts)
}

/// Stores the post-session summary on a session record.
pub fn update_session_summary(
    conn: &Connection,
    session_id: &str,
    summary: &str,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        "UPDATE sessions SET summary = ?1 WHERE id = ?2",
        params![summary, session_id],
    )?;
    if updated == 0 {
        return Err(StoreError::SessionNotFound(session_id.to_string()));
    }
    Ok(())
}

/// Deletes a session record owned by `user_id`. Returns `true` if a row was
/// deleted. Transcripts and advice go with it via `ON DELETE CASCADE`.
pub fn delete_session(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM sessions WHERE id = ?1 AND user_id = ?2",
        params![session_id, user_id],
    )?;
    Ok(deleted > 0)
}

/// Creates a counterpart profile and returns it.
pub fn create_counterpart(
    conn: &Connection,
    params: &NewCounterpart<'_>,
) -> Result<Counterpart, StoreError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO counterparts (id, user_id, organization_id, name, department, personality_notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            id,
            params.user_id,
            params.organization_id,
            params.name,
            params.department,
            params.personality_notes,
        ],
    )?;
    get_counterpart(conn, &id)
}

/// Retrieves a counterpart profile by ID.
pub fn get_counterpart(conn: &Connection, counterpart_id: &str) -> Result<Counterpart, StoreError> {
    conn.query_row(
        "SELECT id, user_id, organization_id, name, department, personality_notes, created_at
         FROM counterparts WHERE id = ?1",
        [counterpart_id],
        map_row_to_counterpart,
    )
    .optional()?
    .ok_or_else(|| StoreError::CounterpartNotFound(counterpart_id.to_string()))
}

/// Lists the counterpart profiles belonging to a user.
pub fn list_counterparts(conn: &Connection, user_id: &str) -> Result<Vec<Counterpart>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, organization_id, name, department, personality_notes, created_at
         FROM counterparts WHERE user_id = ?1 ORDER BY name ASC",
    )?;

    let rows = stmt.query_map([user_id], map_row_to_counterpart)?;
    let mut counterparts = Vec::new();
    for row in rows {
        counterparts.push(row?);
    }
    Ok(counterparts)
}

fn map_row_to_session(row: &Row<'_>) -> rusqlite::Result<Result<SessionRecord, StoreError>> {
    let mode_str: String = row.get(3)?;
    Ok(match mode_str.parse::<SessionMode>() {
        Ok(mode) => Ok(SessionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            organization_id: row.get(2)?,
            mode,
            counterpart_id: row.get(4)?,
            title: row.get(5)?,
            summary: row.get(6)?,
            created_at: row.get(7)?,
        }),
        Err(e) => Err(StoreError::InvalidValue(e.to_string())),
    })
}

fn map_row_to_counterpart(row: &Row<'_>) -> rusqlite::Result<Counterpart> {
    Ok(Counterpart {
        id: row.get(0)?,
        user_id: row.get(1)?,
        organization_id: row.get(2)?,
        name: row.get(3)?,
        department: row.get(4)?,
        personality_notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}
