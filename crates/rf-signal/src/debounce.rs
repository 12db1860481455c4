//! Payload debouncing
//!
//! Two independent suppression mechanisms:
//!
//! - [`DebounceFilter`] drops a payload whose exact bit-string was already
//!   seen within the window. Each distinct value gets a fixed cool-down from
//!   its first sighting; repeats never extend it.
//! - [`ManualDebounce`] silences every payload for a while, typically around
//!   a subscriber's own transmission.
//!
//! Both are evaluated against the stamp the radio put on a frame when it
//! arrived, not the moment it is processed.

use std::collections::HashMap;
use std::time::Duration;

use rf_protocol::Stamp;
use tokio::time::Instant;

/// Who a manual debounce applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceScope {
    /// Only the subscriber that requested it
    Instance,
    /// Every subscriber sharing the signature
    AllSubscribers,
}

/// Fixed-window deduplication keyed by bit-string
#[derive(Debug, Clone)]
pub struct DebounceFilter {
    window: Duration,
    /// bit-string -> instant its entry expires
    entries: HashMap<String, Instant>,
}

impl DebounceFilter {
    /// Create a filter; a zero window disables it
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Configured window
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether the filter does anything
    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// Check a payload that arrived at `at`
    ///
    /// Returns `true` if it passes. Expired entries are dropped first, which
    /// is equivalent to their timers having fired before this payload.
    pub fn admit(&mut self, bit_string: &str, at: Instant) -> bool {
        if !self.is_enabled() {
            return true;
        }

        self.entries.retain(|_, expires| *expires > at);
        if self.entries.contains_key(bit_string) {
            return false;
        }
        self.entries.insert(bit_string.to_string(), at + self.window);
        true
    }

    /// Number of payload values currently cooling down
    pub fn pending(&self) -> usize {
        self.entries.len()
    }
}

/// A restartable suppress-everything window
///
/// The window opens at the stamp taken when it is armed, so only frames the
/// radio stamped afterwards are suppressed. Frames already in flight when
/// it is armed pass, however late they are processed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualDebounce {
    /// (armed at, expires at)
    window: Option<(Stamp, Instant)>,
}

impl ManualDebounce {
    /// Suppress frames stamped after `now` for `duration`
    ///
    /// Re-arming while active replaces the expiry but keeps the start, so
    /// frames that arrived under the earlier window stay suppressed.
    pub fn arm(&mut self, now: Stamp, duration: Duration) {
        let start = match self.window {
            Some((start, until)) if now.instant() < until => start,
            _ => now,
        };
        self.window = Some((start, now.instant() + duration));
    }

    /// Whether a frame with arrival stamp `at` is suppressed
    pub fn is_active_at(&self, at: &Stamp) -> bool {
        matches!(
            self.window,
            Some((start, until)) if at.is_after(&start) && at.instant() < until
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_repeat_within_window_is_dropped() {
        let t0 = Instant::now();
        let mut filter = DebounceFilter::new(WINDOW);

        assert!(filter.admit("1011", t0));
        assert!(!filter.admit("1011", t0 + ms(100)));
        assert!(filter.admit("0011", t0 + ms(100)));
        assert_eq!(filter.pending(), 2);
    }

    #[test]
    fn test_repeat_does_not_extend_window() {
        let t0 = Instant::now();
        let mut filter = DebounceFilter::new(WINDOW);

        assert!(filter.admit("1011", t0));
        assert!(!filter.admit("1011", t0 + ms(400)));
        // Window counts from the first sighting only
        assert!(filter.admit("1011", t0 + ms(600)));
    }

    #[test]
    fn test_entry_expires_exactly_at_window() {
        let t0 = Instant::now();
        let mut filter = DebounceFilter::new(WINDOW);

        assert!(filter.admit("1", t0));
        assert!(!filter.admit("1", t0 + ms(499)));
        assert!(filter.admit("1", t0 + WINDOW));
    }

    #[test]
    fn test_zero_window_disables() {
        let t0 = Instant::now();
        let mut filter = DebounceFilter::new(Duration::ZERO);

        assert!(!filter.is_enabled());
        assert!(filter.admit("1011", t0));
        assert!(filter.admit("1011", t0));
        assert_eq!(filter.pending(), 0);
    }

    #[test]
    fn test_manual_debounce_window() {
        let t0 = Instant::now();
        let mut manual = ManualDebounce::default();
        assert!(!manual.is_active_at(&Stamp::at(t0)));

        let in_flight = Stamp::at(t0 + ms(20));
        manual.arm(Stamp::at(t0 + ms(10)), ms(100));
        assert!(!manual.is_active_at(&in_flight), "earlier arrivals are not affected");
        assert!(manual.is_active_at(&Stamp::at(t0 + ms(10))));
        assert!(manual.is_active_at(&Stamp::at(t0 + ms(109))));
        assert!(!manual.is_active_at(&Stamp::at(t0 + ms(110))));
    }

    #[test]
    fn test_manual_debounce_same_instant_orders_by_stamp() {
        let t0 = Instant::now();
        let mut manual = ManualDebounce::default();

        let before = Stamp::at(t0);
        manual.arm(Stamp::at(t0), ms(100));
        let after = Stamp::at(t0);

        assert!(!manual.is_active_at(&before));
        assert!(manual.is_active_at(&after));
    }

    #[test]
    fn test_manual_debounce_rearm_restarts_timer() {
        let t0 = Instant::now();
        let mut manual = ManualDebounce::default();

        manual.arm(Stamp::at(t0), ms(100));
        let under_first = Stamp::at(t0 + ms(50));
        manual.arm(Stamp::at(t0 + ms(80)), ms(100));

        assert!(manual.is_active_at(&under_first));
        assert!(manual.is_active_at(&Stamp::at(t0 + ms(150))));
        assert!(!manual.is_active_at(&Stamp::at(t0 + ms(180))));
    }

    #[test]
    fn test_manual_debounce_rearm_after_expiry_starts_fresh() {
        let t0 = Instant::now();
        let mut manual = ManualDebounce::default();

        manual.arm(Stamp::at(t0), ms(100));
        let between = Stamp::at(t0 + ms(150));
        manual.arm(Stamp::at(t0 + ms(300)), ms(100));

        assert!(!manual.is_active_at(&between));
        assert!(manual.is_active_at(&Stamp::at(t0 + ms(350))));
    }

    proptest! {
        /// A payload passes iff no passed payload with the same bit-string
        /// started a window that is still open.
        #[test]
        fn admit_matches_reference_model(
            steps in prop::collection::vec((0usize..3, 0u64..400), 1..60)
        ) {
            let values = ["1011", "0100", "1111"];
            let t0 = Instant::now();
            let mut filter = DebounceFilter::new(WINDOW);
            let mut last_passed: HashMap<&str, Instant> = HashMap::new();
            let mut now = t0;

            for (value, gap) in steps {
                now += ms(gap);
                let key = values[value];
                let expected = last_passed
                    .get(key)
                    .map_or(true, |passed| now >= *passed + WINDOW);

                prop_assert_eq!(filter.admit(key, now), expected);
                if expected {
                    last_passed.insert(key, now);
                }
            }
        }
    }
}
