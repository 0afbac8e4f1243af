//! Shared plain types for the Tandem platform.
//!
//! Kept dependency-light on purpose: every other crate in the workspace
//! consumes these, so nothing heavier than serde belongs here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a session's audio reaches the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Browser microphone: self-describing encoded audio, session record
    /// created implicitly on connect.
    Mic,
    /// Dispatched meeting bot: raw 16 kHz mono linear16 PCM, session record
    /// id supplied out-of-band via connection parameters.
    Bot,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Mic => write!(f, "mic"),
            SessionMode::Bot => write!(f, "bot"),
        }
    }
}

/// Error returned when parsing an unknown session mode string.
#[derive(Debug, thiserror::Error)]
#[error("unknown session mode: {0}")]
pub struct ParseSessionModeError(String);

impl FromStr for SessionMode {
    type Err = ParseSessionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mic" => Ok(SessionMode::Mic),
            "bot" => Ok(SessionMode::Bot),
            other => Err(ParseSessionModeError(other.to_string())),
        }
    }
}

/// One recognized unit of speech. Immutable once created: entries are
/// appended in recognition order and never reordered. The text is always
/// non-empty — empty recognition results are dropped at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Diarized speaker index; 0 when the upstream provides no attribution.
    pub speaker: u32,
    pub text: String,
}

/// Identity attached to an authenticated request, as reported by the
/// external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub organization_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_mode_round_trips_through_str() {
        assert_eq!("mic".parse::<SessionMode>().unwrap(), SessionMode::Mic);
        assert_eq!("bot".parse::<SessionMode>().unwrap(), SessionMode::Bot);
        assert_eq!(SessionMode::Mic.to_string(), "mic");
        assert_eq!(SessionMode::Bot.to_string(), "bot");
        assert!("viewer".parse::<SessionMode>().is_err());
    }

    #[test]
    fn session_mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SessionMode::Bot).unwrap(), "\"bot\"");
    }
}
