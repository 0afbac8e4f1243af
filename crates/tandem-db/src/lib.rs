//! Database layer for the Tandem platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and query helpers for the durable side of the
//! relay: session records, transcripts, advice, and counterpart profiles.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required. WAL
//!   allows concurrent readers with a single writer, which matches the
//!   access pattern here — many read-mostly API requests plus a stream of
//!   small transcript inserts.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management. Callers on async paths go through
//!   `tokio::task::spawn_blocking`.
//! - **Embedded migrations**: SQL is compiled into the binary and tracked in
//!   a versioned table, so the schema cannot drift from the code.
//!
//! Every write on the live relay path is fire-and-forget from the caller's
//! perspective: a failed insert is logged upstream and never interrupts
//! broadcasting.

mod migrations;
mod pool;
mod store;

pub use migrations::run_migrations;
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
pub use store::{
    append_advice, append_transcript, create_counterpart, create_session, delete_session,
    get_counterpart, get_session, list_counterparts, list_transcripts, update_session_summary,
    Counterpart, NewCounterpart, NewSession, SessionRecord, StoreError, TranscriptRow,
};
