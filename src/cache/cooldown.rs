//! Per-tag invalidation cooldown windows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::cooldown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRecord {
    pub last_invalidation: Instant,
    pub cooldown: Option<Duration>,
    /// An invalidation was suppressed and has not been applied yet.
    pub pending: bool,
}

impl CooldownRecord {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let cooldown = self.cooldown?;
        let until = self.last_invalidation + cooldown;
        if now < until {
            Some(until - now)
        } else {
            None
        }
    }
}

/// Outcome of asking to invalidate a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Proceed,
    Suppressed { remaining: Duration },
}

impl CooldownDecision {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, CooldownDecision::Suppressed { .. })
    }
}

/// Tracks the last invalidation of each tag and the cooldown opted into for it.
///
/// Every operation takes the single map lock, so checking the window and
/// recording a new invalidation cannot interleave between writers.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    records: Mutex<HashMap<String, CooldownRecord>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_suppress_invalidation(&self, tag: &str, now: Instant) -> bool {
        mutex_lock(&self.records, SOURCE, "should_suppress_invalidation")
            .get(tag)
            .and_then(|r| r.remaining(now))
            .is_some()
    }

    pub fn record_invalidation(&self, tag: &str, now: Instant) {
        let mut records = mutex_lock(&self.records, SOURCE, "record_invalidation");
        records
            .entry(tag.to_string())
            .and_modify(|r| {
                r.last_invalidation = now;
                r.pending = false;
            })
            .or_insert(CooldownRecord {
                last_invalidation: now,
                cooldown: None,
                pending: false,
            });
    }

    /// Check the window and record the invalidation in one step.
    pub fn begin_invalidation(&self, tag: &str, now: Instant) -> CooldownDecision {
        let mut records = mutex_lock(&self.records, SOURCE, "begin_invalidation");
        match records.get_mut(tag) {
            Some(record) => {
                if let Some(remaining) = record.remaining(now) {
                    record.pending = true;
                    return CooldownDecision::Suppressed { remaining };
                }
                record.last_invalidation = now;
                record.pending = false;
            }
            None => {
                records.insert(
                    tag.to_string(),
                    CooldownRecord {
                        last_invalidation: now,
                        cooldown: None,
                        pending: false,
                    },
                );
            }
        }
        CooldownDecision::Proceed
    }

    /// Opt `tag` into a cooldown. The duration always replaces the previous
    /// one; a tag seen for the first time starts its window at `now`.
    pub fn configure(&self, tag: &str, cooldown: Duration, now: Instant) {
        let mut records = mutex_lock(&self.records, SOURCE, "configure");
        records
            .entry(tag.to_string())
            .and_modify(|r| r.cooldown = Some(cooldown))
            .or_insert(CooldownRecord {
                last_invalidation: now,
                cooldown: Some(cooldown),
                pending: false,
            });
    }

    /// Clear a suppressed invalidation whose window has elapsed. Returns true
    /// when the caller should now forget the tag.
    pub fn take_expired_pending(&self, tag: &str, now: Instant) -> bool {
        let mut records = mutex_lock(&self.records, SOURCE, "take_expired_pending");
        match records.get_mut(tag) {
            Some(record) if record.pending && record.remaining(now).is_none() => {
                record.pending = false;
                record.last_invalidation = now;
                true
            }
            _ => false,
        }
    }

    /// Leave an invalidation owed on `tag`, e.g. after a store failed to
    /// forget it. The next read past the window applies it.
    pub fn mark_pending(&self, tag: &str, now: Instant) {
        let mut records = mutex_lock(&self.records, SOURCE, "mark_pending");
        records
            .entry(tag.to_string())
            .and_modify(|r| r.pending = true)
            .or_insert(CooldownRecord {
                last_invalidation: now,
                cooldown: None,
                pending: true,
            });
    }

    pub fn record(&self, tag: &str) -> Option<CooldownRecord> {
        mutex_lock(&self.records, SOURCE, "record").get(tag).copied()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.records, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TAG: &str = "ns:env:author";

    #[test]
    fn unknown_tag_proceeds() {
        let tracker = CooldownTracker::new();
        let now = Instant::now();
        assert!(!tracker.should_suppress_invalidation(TAG, now));
        assert_eq!(tracker.begin_invalidation(TAG, now), CooldownDecision::Proceed);
        assert_eq!(tracker.begin_invalidation(TAG, now), CooldownDecision::Proceed);
    }

    #[test]
    fn configured_window_suppresses_until_elapsed() {
        let tracker = CooldownTracker::new();
        let t0 = Instant::now();
        tracker.configure(TAG, Duration::from_secs(60), t0);

        let decision = tracker.begin_invalidation(TAG, t0 + Duration::from_secs(10));
        assert_eq!(
            decision,
            CooldownDecision::Suppressed {
                remaining: Duration::from_secs(50)
            }
        );
        assert!(tracker.record(TAG).unwrap().pending);

        let later = t0 + Duration::from_secs(60);
        assert!(!tracker.should_suppress_invalidation(TAG, later));
        assert_eq!(tracker.begin_invalidation(TAG, later), CooldownDecision::Proceed);
        let record = tracker.record(TAG).unwrap();
        assert_eq!(record.last_invalidation, later);
        assert!(!record.pending);
    }

    #[test]
    fn configure_keeps_existing_window_start() {
        let tracker = CooldownTracker::new();
        let t0 = Instant::now();
        tracker.record_invalidation(TAG, t0);
        tracker.configure(TAG, Duration::from_secs(5), t0 + Duration::from_secs(3));
        tracker.configure(TAG, Duration::from_secs(10), t0 + Duration::from_secs(4));
        let record = tracker.record(TAG).unwrap();
        assert_eq!(record.last_invalidation, t0);
        assert_eq!(record.cooldown, Some(Duration::from_secs(10)));
        assert!(tracker.should_suppress_invalidation(TAG, t0 + Duration::from_secs(9)));
    }

    #[test]
    fn expired_pending_is_taken_once() {
        let tracker = CooldownTracker::new();
        let t0 = Instant::now();
        tracker.configure(TAG, Duration::from_secs(5), t0);
        assert!(!tracker.take_expired_pending(TAG, t0 + Duration::from_secs(10)));

        tracker.begin_invalidation(TAG, t0 + Duration::from_secs(1));
        assert!(!tracker.take_expired_pending(TAG, t0 + Duration::from_secs(2)));
        assert!(tracker.take_expired_pending(TAG, t0 + Duration::from_secs(6)));
        assert!(!tracker.take_expired_pending(TAG, t0 + Duration::from_secs(20)));
    }

    #[test]
    fn marked_pending_is_retried_without_window() {
        let tracker = CooldownTracker::new();
        let t0 = Instant::now();
        assert_eq!(tracker.begin_invalidation(TAG, t0), CooldownDecision::Proceed);
        tracker.mark_pending(TAG, t0);
        assert!(tracker.take_expired_pending(TAG, t0));
        assert!(!tracker.take_expired_pending(TAG, t0));

        tracker.mark_pending("ns:env:book", t0);
        assert!(tracker.take_expired_pending("ns:env:book", t0));
    }

    #[test]
    fn marked_pending_waits_for_open_window() {
        let tracker = CooldownTracker::new();
        let t0 = Instant::now();
        tracker.configure(TAG, Duration::from_secs(5), t0);
        tracker.mark_pending(TAG, t0 + Duration::from_secs(1));
        assert!(!tracker.take_expired_pending(TAG, t0 + Duration::from_secs(2)));
        assert!(tracker.take_expired_pending(TAG, t0 + Duration::from_secs(5)));
    }

    #[test]
    fn concurrent_writers_pass_window_once() {
        let tracker = Arc::new(CooldownTracker::new());
        let t0 = Instant::now();
        tracker.configure(TAG, Duration::from_secs(30), t0);
        let now = t0 + Duration::from_secs(30);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.begin_invalidation(TAG, now))
            })
            .collect();
        let proceeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|d| !d.is_suppressed())
            .count();
        assert_eq!(proceeded, 1);
    }
}
