//! Streaming STT session configuration.

use crate::error::SttError;
use url::Url;

/// Explicit sample format for headerless raw PCM audio.
///
/// A browser-originated stream is a self-describing encoded container the
/// upstream service can auto-detect; a dispatched meeting-bot stream is raw
/// PCM with no header, and the service must be told its shape explicitly or
/// recognition fails silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPcmFormat {
    pub encoding: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RawPcmFormat {
    /// The format meeting bots deliver: 16 kHz mono linear16.
    pub fn linear16_16khz_mono() -> Self {
        Self {
            encoding: "linear16".to_string(),
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Configuration for one live STT session.
#[derive(Debug, Clone)]
pub struct LiveSttConfig {
    /// WebSocket endpoint of the streaming STT service
    /// (e.g. `wss://api.deepgram.com/v1/listen`).
    pub url: String,
    /// API key sent as an `Authorization: Token …` header. Empty disables
    /// the header (local test upstreams).
    pub api_key: String,
    pub model: String,
    pub language: String,
    pub smart_format: bool,
    pub diarize: bool,
    /// Set only for raw uncompressed PCM sources; `None` lets the service
    /// auto-detect a self-describing container.
    pub raw_pcm: Option<RawPcmFormat>,
}

impl LiveSttConfig {
    /// Builds the connect URL with all session options as query parameters.
    pub fn connect_url(&self) -> Result<Url, SttError> {
        let mut url = Url::parse(&self.url)?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", &self.model);
            query.append_pair("language", &self.language);
            query.append_pair("smart_format", if self.smart_format { "true" } else { "false" });
            query.append_pair("diarize", if self.diarize { "true" } else { "false" });

            if let Some(pcm) = &self.raw_pcm {
                query.append_pair("encoding", &pcm.encoding);
                query.append_pair("sample_rate", &pcm.sample_rate.to_string());
                query.append_pair("channels", &pcm.channels.to_string());
            }
        }

        Ok(url)
    }
}
