//! Notification Deduplicator
//!
//! Suppresses repeat notifications for the same (device, condition) pair
//! inside the condition's cooldown window. Event records are not affected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
struct LastNotified {
    at: DateTime<Utc>,
    cooldown: Duration,
}

/// Per (device, condition) last-notified timestamps
#[derive(Debug, Default)]
pub struct NotificationDeduplicator {
    last_notified: DashMap<(String, i64), LastNotified>,
}

impl NotificationDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether a firing is forwarded, recording `now` when it is
    ///
    /// A zero cooldown always forwards and leaves no state behind. The
    /// check and update happen under the entry lock, so two producers
    /// racing on the same pair forward at most once per window.
    pub fn should_notify(
        &self,
        device_id: &str,
        condition_id: i64,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if cooldown_secs == 0 {
            return true;
        }
        let cooldown = Duration::from_secs(cooldown_secs);

        match self.last_notified.entry((device_id.to_string(), condition_id)) {
            Entry::Vacant(slot) => {
                slot.insert(LastNotified { at: now, cooldown });
                true
            },
            Entry::Occupied(mut slot) => {
                if elapsed(slot.get().at, now) >= cooldown {
                    slot.insert(LastNotified { at: now, cooldown });
                    true
                } else {
                    debug!(
                        "Notification suppressed: device={} condition={} last={}",
                        device_id,
                        condition_id,
                        slot.get().at
                    );
                    false
                }
            },
        }
    }

    /// Drop entries whose cooldown has elapsed; returns how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.last_notified.len();
        self.last_notified
            .retain(|_, last| elapsed(last.at, now) < last.cooldown);
        before.saturating_sub(self.last_notified.len())
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

/// Time since `since`; zero if the clock went backwards
fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default()
    }

    #[test]
    fn test_zero_cooldown_always_notifies() {
        let dedup = NotificationDeduplicator::new();
        assert!(dedup.should_notify("dev-1", 1, 0, t0()));
        assert!(dedup.should_notify("dev-1", 1, 0, t0()));
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_cooldown_window() {
        let dedup = NotificationDeduplicator::new();
        let now = t0();
        assert!(dedup.should_notify("dev-1", 1, 300, now));
        assert!(!dedup.should_notify("dev-1", 1, 300, now + TimeDelta::seconds(299)));
        assert!(dedup.should_notify("dev-1", 1, 300, now + TimeDelta::seconds(300)));
        // The suppressed attempt did not move the window
        assert!(!dedup.should_notify("dev-1", 1, 300, now + TimeDelta::seconds(599)));
    }

    #[test]
    fn test_pairs_are_independent() {
        let dedup = NotificationDeduplicator::new();
        let now = t0();
        assert!(dedup.should_notify("dev-1", 1, 300, now));
        assert!(dedup.should_notify("dev-2", 1, 300, now));
        assert!(dedup.should_notify("dev-1", 2, 300, now));
        assert_eq!(dedup.len(), 3);
    }

    #[test]
    fn test_purge_expired() {
        let dedup = NotificationDeduplicator::new();
        let now = t0();
        dedup.should_notify("dev-1", 1, 60, now);
        dedup.should_notify("dev-1", 2, 600, now);

        assert_eq!(dedup.purge_expired(now + TimeDelta::seconds(61)), 1);
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.purge_expired(now + TimeDelta::seconds(600)), 1);
        assert!(dedup.is_empty());
    }
}
