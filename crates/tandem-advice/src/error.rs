use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdviceError {
    #[error("advice provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("advice provider error: {0}")]
    Provider(String),

    #[error("advice provider returned no text")]
    EmptyResponse,
}
