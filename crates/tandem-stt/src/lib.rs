//! Streaming speech-to-text bridge for the Tandem platform.
//!
//! Wraps one external streaming STT session for the lifetime of one inbound
//! audio connection. Audio frames are forwarded upstream in receipt order,
//! unmodified, with no buffering or re-chunking — back-pressure is left to
//! the transport and the external service. Recognition results come back as
//! [`Utterance`] events on an mpsc channel, preserving per-stream order
//! without requiring the consumer to block inside a callback.
//!
//! The upstream connection is billable: [`LiveSttSession::finish`] must run
//! on every exit path, which the relay orchestrator guarantees.

mod config;
mod error;
mod live;

pub use config::{LiveSttConfig, RawPcmFormat};
pub use error::SttError;
pub use live::{LiveSttSession, Utterance};
