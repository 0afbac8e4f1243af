//! Advice-trigger throttling.
//!
//! The downstream advice-generation call is the expensive, rate-limited,
//! externally billed operation in the pipeline, and this watermark gate is
//! the only thing standing between it and a transcript event firehose.

/// Number of new transcript entries required between advice triggers.
pub const ADVICE_TRIGGER_THRESHOLD: usize = 10;

/// Decides whether enough new transcript material has accumulated to
/// justify another advice invocation, and if so advances the watermark to
/// `current_count`.
///
/// The watermark advances at trigger time, not at completion time: entries
/// arriving while a generation call is in flight are counted toward the
/// next window rather than re-counted, so concurrent triggers cannot pile
/// up. The flip side — a slow call may deliver its advice after a newer
/// trigger's — is accepted behavior.
///
/// Callers must invoke this under the same lock that guards the transcript
/// buffer the count was read from; the compare-and-advance is only atomic
/// if the count cannot move underneath it.
pub fn advice_due(current_count: usize, watermark: &mut usize) -> bool {
    if current_count.saturating_sub(*watermark) >= ADVICE_TRIGGER_THRESHOLD {
        *watermark = current_count;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_every_threshold_entries() {
        let mut watermark = 0;
        let mut fired = 0;

        for count in 1..=95 {
            if advice_due(count, &mut watermark) {
                fired += 1;
            }
        }

        // floor(95 / 10) triggers for 95 single-entry appends.
        assert_eq!(fired, 9);
        assert_eq!(watermark, 90);
    }

    #[test]
    fn no_trigger_below_threshold() {
        let mut watermark = 0;
        for count in 1..ADVICE_TRIGGER_THRESHOLD {
            assert!(!advice_due(count, &mut watermark));
            assert_eq!(watermark, 0, "watermark must not move without a trigger");
        }
        assert!(advice_due(ADVICE_TRIGGER_THRESHOLD, &mut watermark));
        assert_eq!(watermark, ADVICE_TRIGGER_THRESHOLD);
    }

    #[test]
    fn watermark_jumps_to_observed_count() {
        let mut watermark = 0;
        // A burst past the threshold advances to the count seen at trigger
        // time, not to watermark + threshold.
        assert!(advice_due(27, &mut watermark));
        assert_eq!(watermark, 27);
        assert!(!advice_due(36, &mut watermark));
        assert!(advice_due(37, &mut watermark));
    }

    #[test]
    fn tolerates_watermark_ahead_of_count() {
        // A session that was torn down and recreated starts from zero; a
        // stale watermark larger than the count must not underflow.
        let mut watermark = 50;
        assert!(!advice_due(3, &mut watermark));
    }
}
