//! Live streaming STT session over WebSocket.

use crate::config::LiveSttConfig;
use crate::error::SttError;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Capacity of the outbound frame queue feeding the writer task.
const FRAME_QUEUE_CAPACITY: usize = 64;

/// Capacity of the utterance event channel.
const UTTERANCE_QUEUE_CAPACITY: usize = 256;

/// Control frame that tells the upstream service the audio stream is done.
const CLOSE_STREAM_FRAME: &str = r#"{"type":"CloseStream"}"#;

/// One recognized unit of speech emitted by the upstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Diarized speaker index; 0 when the result carries no attribution.
    pub speaker: u32,
    pub text: String,
}

enum WriterCommand {
    Frame(Vec<u8>),
    Finish,
}

/// One live session against the external streaming STT service.
///
/// Owns the upstream WebSocket through two detached tasks: a writer that
/// forwards audio frames in receipt order and a reader that converts JSON
/// recognition results into [`Utterance`] events. The utterance channel
/// closes when the upstream ends the stream, errors out, or acknowledges
/// [`finish`](Self::finish); callers cannot tell a mid-stream upstream
/// error apart from a graceful end, and do not need to.
pub struct LiveSttSession {
    frames_tx: mpsc::Sender<WriterCommand>,
    finished: AtomicBool,
}

impl LiveSttSession {
    /// Establishes the upstream session.
    ///
    /// Returns the session handle and the receiver for recognized
    /// utterances. Fails with [`SttError::Connect`] when the upstream
    /// WebSocket cannot be established.
    pub async fn start(
        config: &LiveSttConfig,
    ) -> Result<(Self, mpsc::Receiver<Utterance>), SttError> {
        let url = config.connect_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| SttError::Connect(e.to_string()))?;

        if !config.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Token {}", config.api_key))
                .map_err(|e| SttError::Connect(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| SttError::Connect(e.to_string()))?;

        tracing::debug!(
            model = %config.model,
            raw_pcm = config.raw_pcm.is_some(),
            "transcription session established"
        );

        let (mut sink, mut source) = stream.split();

        let (frames_tx, mut frames_rx) = mpsc::channel::<WriterCommand>(FRAME_QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(command) = frames_rx.recv().await {
                match command {
                    WriterCommand::Frame(bytes) => {
                        if let Err(e) = sink.send(Message::Binary(bytes)).await {
                            tracing::debug!("transcription send failed, ending writer: {}", e);
                            break;
                        }
                    }
                    WriterCommand::Finish => {
                        let _ = sink
                            .send(Message::Text(CLOSE_STREAM_FRAME.to_string()))
                            .await;
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        });

        let (utterances_tx, utterances_rx) = mpsc::channel(UTTERANCE_QUEUE_CAPACITY);
        tokio::spawn(async move {
            while let Some(result) = source.next().await {
                let message = match result {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!("transcription stream error, ending reader: {}", e);
                        break;
                    }
                };

                match message {
                    Message::Text(text) => match serde_json::from_str::<LiveResult>(&text) {
                        Ok(parsed) => {
                            if let Some(utterance) = parsed.into_utterance() {
                                if utterances_tx.send(utterance).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::debug!("unrecognized upstream frame, skipping: {}", e);
                        }
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        });

        Ok((
            Self {
                frames_tx,
                finished: AtomicBool::new(false),
            },
            utterances_rx,
        ))
    }

    /// Forwards one audio frame upstream, unmodified.
    ///
    /// Fails with [`SttError::Closed`] once the session has been finished
    /// or the upstream connection has gone away.
    pub async fn send(&self, frame: Vec<u8>) -> Result<(), SttError> {
        if self.finished.load(Ordering::Acquire) {
            return Err(SttError::Closed);
        }
        self.frames_tx
            .send(WriterCommand::Frame(frame))
            .await
            .map_err(|_| SttError::Closed)
    }

    /// Closes the upstream session. Idempotent; later [`send`](Self::send)
    /// calls are rejected.
    pub async fn finish(&self) {
        if self.finished.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.frames_tx.send(WriterCommand::Finish).await;
    }
}

impl Drop for LiveSttSession {
    fn drop(&mut self) {
        // Last-resort close for sessions dropped without finish(); the
        // upstream connection is billable.
        if !self.finished.swap(true, Ordering::AcqRel) {
            let _ = self.frames_tx.try_send(WriterCommand::Finish);
        }
    }
}

/// Wire shape of an upstream recognition result.
#[derive(Debug, Default, Deserialize)]
struct LiveResult {
    #[serde(default)]
    channel: LiveChannel,
}

#[derive(Debug, Default, Deserialize)]
struct LiveChannel {
    #[serde(default)]
    alternatives: Vec<LiveAlternative>,
}

#[derive(Debug, Default, Deserialize)]
struct LiveAlternative {
    #[serde(default)]
    transcript: String,
    #[serde(default)]
    words: Vec<LiveWord>,
}

#[derive(Debug, Deserialize)]
struct LiveWord {
    #[serde(default)]
    speaker: u32,
}

impl LiveResult {
    /// Converts a raw result into an utterance. Empty transcripts are
    /// discarded here, before any downstream effect; the speaker index
    /// comes from the first word, defaulting to 0 without diarization data.
    fn into_utterance(self) -> Option<Utterance> {
        let alternative = self.channel.alternatives.into_iter().next()?;
        if alternative.transcript.is_empty() {
            return None;
        }
        let speaker = alternative.words.first().map(|w| w.speaker).unwrap_or(0);
        Some(Utterance {
            speaker,
            text: alternative.transcript,
        })
    }
}
