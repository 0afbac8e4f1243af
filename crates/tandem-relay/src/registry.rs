//! Process-wide registry of live sessions and their observers.

use std::collections::HashMap;
use std::sync::Arc;
use tandem_types::TranscriptEntry;
use tokio::sync::{mpsc, Mutex, RwLock};
use uuid::Uuid;

use crate::throttle::advice_due;

/// Identifies one observer connection within a session.
pub type ObserverId = Uuid;

/// Everything the relay tracks for one live session. The observer set, the
/// transcript buffer, and the watermark form one logical unit of mutation:
/// they are only ever touched together, under this state's lock.
struct SessionState {
    /// Active observers: observer id -> outbound message sender.
    observers: HashMap<ObserverId, mpsc::Sender<String>>,
    /// Transcript entries in recognition order.
    transcript: Vec<TranscriptEntry>,
    /// Transcript count at the last advice trigger.
    watermark: usize,
    /// Counterpart profile biasing advice generation, if set.
    counterpart_id: Option<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            observers: HashMap::new(),
            transcript: Vec::new(),
            watermark: 0,
            counterpart_id: None,
        }
    }
}

/// Keyed table of live session state.
///
/// Membership changes (`join`, `leave`) hold the outer map write lock across
/// the observer-set mutation so the create-on-first-join and
/// destroy-on-last-leave transitions are atomic with respect to each other.
/// Everything else takes only a map read lock to find the per-session mutex,
/// so operations on different session keys never contend. Lock order is
/// always map before session.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Arc<Mutex<SessionState>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a new observer for a session and returns its ID.
    ///
    /// The first observer for a key brings the session live with an empty
    /// transcript buffer and a zero watermark.
    pub async fn join(&self, session_key: &str, sender: mpsc::Sender<String>) -> ObserverId {
        let observer_id = Uuid::new_v4();

        // The map write lock is held across the observer insert, mirroring
        // leave: a concurrent last-leave must not sweep the entry away
        // between the lookup and the insert, which would register the
        // observer on state the map no longer points at.
        let mut sessions = self.sessions.write().await;
        let state = sessions
            .entry(session_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::new())))
            .clone();
        state.lock().await.observers.insert(observer_id, sender);

        tracing::debug!(session_key, %observer_id, "observer joined");
        observer_id
    }

    /// Removes an observer from a session. Idempotent: unknown keys and
    /// already-removed observers are no-ops.
    ///
    /// When the last observer leaves, the session's transcript buffer,
    /// watermark, and counterpart association are all discarded.
    pub async fn leave(&self, session_key: &str, observer_id: ObserverId) {
        let mut sessions = self.sessions.write().await;
        let Some(state) = sessions.get(session_key).cloned() else {
            return;
        };

        // The map write lock is held across the state mutation so that a
        // concurrent join cannot slip in between "observer set went empty"
        // and the map removal.
        let mut guard = state.lock().await;
        guard.observers.remove(&observer_id);

        if guard.observers.is_empty() {
            drop(guard);
            sessions.remove(session_key);
            tracing::debug!(session_key, "last observer left, session state reclaimed");
        }
    }

    /// Appends a transcript entry. Unknown session keys are tolerated (the
    /// audio source can outlive its observers mid-flight) and empty text
    /// never enters the buffer.
    pub async fn append_transcript(&self, session_key: &str, speaker: u32, text: &str) {
        if text.is_empty() {
            return;
        }
        let Some(state) = self.session(session_key).await else {
            return;
        };

        state.lock().await.transcript.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
        });
    }

    /// Returns at most the last `limit` transcript entries, oldest first.
    /// Empty for unknown session keys.
    pub async fn recent_context(&self, session_key: &str, limit: usize) -> Vec<TranscriptEntry> {
        let Some(state) = self.session(session_key).await else {
            return Vec::new();
        };

        let guard = state.lock().await;
        let start = guard.transcript.len().saturating_sub(limit);
        guard.transcript[start..].to_vec()
    }

    /// Delivers a message to every current observer of the session.
    ///
    /// Best-effort push: a send failure on one observer (slow consumer,
    /// connection already closing) never affects delivery to the others and
    /// is never surfaced as an error. The durable record lives in the
    /// store, not here.
    pub async fn broadcast(&self, session_key: &str, message_json: String) {
        let Some(state) = self.session(session_key).await else {
            return;
        };

        let guard = state.lock().await;
        for (observer_id, sender) in &guard.observers {
            if let Err(e) = sender.try_send(message_json.clone()) {
                tracing::warn!(
                    session_key,
                    %observer_id,
                    "dropping broadcast message for unreachable observer: {}",
                    e
                );
            }
        }
    }

    /// Associates a counterpart profile with the session.
    pub async fn set_counterpart(&self, session_key: &str, counterpart_id: String) {
        if let Some(state) = self.session(session_key).await {
            state.lock().await.counterpart_id = Some(counterpart_id);
        }
    }

    /// Returns the counterpart profile associated with the session, if any.
    pub async fn counterpart(&self, session_key: &str) -> Option<String> {
        let state = self.session(session_key).await?;
        let guard = state.lock().await;
        guard.counterpart_id.clone()
    }

    /// Runs the advice throttle gate for a session: returns `true` and
    /// advances the watermark iff enough new entries have accumulated since
    /// the last trigger. The check-and-advance happens under the same lock
    /// as the transcript buffer, so concurrent appends cannot double-fire a
    /// window.
    pub async fn maybe_trigger_advice(&self, session_key: &str) -> bool {
        let Some(state) = self.session(session_key).await else {
            return false;
        };

        let mut guard = state.lock().await;
        let count = guard.transcript.len();
        advice_due(count, &mut guard.watermark)
    }

    /// Whether any observer is currently registered for the key.
    pub async fn is_live(&self, session_key: &str) -> bool {
        self.sessions.read().await.contains_key(session_key)
    }

    /// Number of observers currently registered for the key.
    pub async fn observer_count(&self, session_key: &str) -> usize {
        match self.session(session_key).await {
            Some(state) => state.lock().await.observers.len(),
            None => 0,
        }
    }

    async fn session(&self, session_key: &str) -> Option<Arc<Mutex<SessionState>>> {
        self.sessions.read().await.get(session_key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
        mpsc::channel(64)
    }

    #[tokio::test]
    async fn first_join_initializes_fresh_state() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = observer();

        assert!(!registry.is_live("s1").await);
        registry.join("s1", tx).await;
        assert!(registry.is_live("s1").await);
        assert!(registry.recent_context("s1", 20).await.is_empty());
    }

    #[tokio::test]
    async fn last_leave_reclaims_everything() {
        let registry = SessionRegistry::new();
        let (tx_a, _rx_a) = observer();
        let (tx_b, _rx_b) = observer();

        let a = registry.join("s1", tx_a).await;
        let b = registry.join("s1", tx_b).await;

        registry.append_transcript("s1", 0, "hello").await;
        registry.set_counterpart("s1", "cp-1".to_string()).await;

        registry.leave("s1", a).await;
        assert!(registry.is_live("s1").await, "one observer remains");
        assert_eq!(registry.recent_context("s1", 20).await.len(), 1);

        registry.leave("s1", b).await;
        assert!(!registry.is_live("s1").await);
        assert!(registry.recent_context("s1", 20).await.is_empty());
        assert_eq!(registry.counterpart("s1").await, None);

        // Re-join starts from scratch — no bleed-through from the previous
        // observation period.
        let (tx_c, _rx_c) = observer();
        registry.join("s1", tx_c).await;
        assert!(registry.recent_context("s1", 20).await.is_empty());
        assert!(!registry.maybe_trigger_advice("s1").await);
    }

    #[tokio::test]
    async fn leave_is_idempotent_and_tolerates_unknown_keys() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = observer();

        let id = registry.join("s1", tx).await;
        registry.leave("s1", id).await;
        registry.leave("s1", id).await;
        registry.leave("never-joined", id).await;
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_noop() {
        let registry = SessionRegistry::new();
        registry.append_transcript("ghost", 0, "anyone there").await;
        assert!(registry.recent_context("ghost", 20).await.is_empty());
    }

    #[tokio::test]
    async fn empty_text_never_enters_the_buffer() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = observer();
        registry.join("s1", tx).await;

        registry.append_transcript("s1", 0, "").await;
        registry.append_transcript("s1", 0, "real").await;

        let context = registry.recent_context("s1", 20).await;
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].text, "real");
    }

    #[tokio::test]
    async fn recent_context_returns_tail_oldest_first() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = observer();
        registry.join("s1", tx).await;

        for i in 0..30 {
            registry
                .append_transcript("s1", (i % 2) as u32, &format!("entry {i}"))
                .await;
        }

        let context = registry.recent_context("s1", 20).await;
        assert_eq!(context.len(), 20);
        assert_eq!(context.first().unwrap().text, "entry 10");
        assert_eq!(context.last().unwrap().text, "entry 29");
    }

    #[tokio::test]
    async fn broadcast_survives_a_dead_observer() {
        let registry = SessionRegistry::new();
        let (tx_dead, rx_dead) = observer();
        let (tx_live, mut rx_live) = observer();

        registry.join("s1", tx_dead).await;
        registry.join("s1", tx_live).await;
        drop(rx_dead);

        registry.broadcast("s1", "ping".to_string()).await;

        let got = rx_live.try_recv().expect("live observer should receive");
        assert_eq!(got, "ping");
    }

    #[tokio::test]
    async fn advice_triggers_once_per_ten_appends() {
        let registry = SessionRegistry::new();
        let (tx, _rx) = observer();
        registry.join("s1", tx).await;

        let mut fired = 0;
        for i in 0..25 {
            registry
                .append_transcript("s1", 0, &format!("utterance {i}"))
                .await;
            if registry.maybe_trigger_advice("s1").await {
                fired += 1;
            }
        }
        assert_eq!(fired, 2, "floor(25 / 10) triggers");
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = SessionRegistry::new();
        let (tx_a, mut rx_a) = observer();
        let (tx_b, mut rx_b) = observer();

        registry.join("s1", tx_a).await;
        registry.join("s2", tx_b).await;

        registry.append_transcript("s1", 0, "only in s1").await;
        registry.broadcast("s1", "for s1".to_string()).await;

        assert_eq!(rx_a.try_recv().unwrap(), "for s1");
        assert!(rx_b.try_recv().is_err());
        assert!(registry.recent_context("s2", 20).await.is_empty());
    }
}
