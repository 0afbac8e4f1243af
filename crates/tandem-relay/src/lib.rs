//! In-memory session relay state for the Tandem platform.
//!
//! Tracks live sessions — observer connections, the rolling transcript
//! buffer, the advice-trigger watermark, and the associated counterpart
//! profile — across all concurrent audio relays in the process. Pure state
//! machine: no I/O happens here, and no lock is ever held across an await
//! point that leaves this crate.
//!
//! Lifecycle is strict: per-session state is created when the first
//! observer joins and destroyed the instant the observer set becomes empty.
//! The session key persists in durable storage, but the relay's working set
//! never survives a quiet period with zero connections — retaining state
//! for sessions nobody is observing is treated as a correctness bug, not a
//! missed optimization.

mod registry;
mod throttle;

pub use registry::{ObserverId, SessionRegistry};
pub use throttle::{advice_due, ADVICE_TRIGGER_THRESHOLD};
