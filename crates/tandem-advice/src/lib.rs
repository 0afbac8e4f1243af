//! Coaching-advice generation for the Tandem platform.
//!
//! Assembles prompts from recent transcript context (optionally enriched
//! with counterpart personality notes) and calls the external LLM provider.
//! This is the expensive, rate-limited, externally billed half of the
//! relay; the watermark gate in `tandem-relay` decides when it runs.

mod client;
mod error;
mod prompt;

pub use client::AdviceClient;
pub use error::AdviceError;
pub use prompt::{advice_prompt, summary_prompt, ADVICE_CONTEXT_WINDOW};
