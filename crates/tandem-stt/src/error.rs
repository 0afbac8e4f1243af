use thiserror::Error;

#[derive(Error, Debug)]
pub enum SttError {
    #[error("failed to establish transcription session: {0}")]
    Connect(String),

    #[error("invalid transcription endpoint url: {0}")]
    Url(#[from] url::ParseError),

    #[error("transcription stream is not open")]
    Closed,
}
