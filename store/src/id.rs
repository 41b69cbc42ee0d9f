use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

/// Issues millisecond timestamps that strictly increase within a process.
///
/// Two calls in the same millisecond get consecutive values instead of the
/// same one. Clones share the last issued value.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: Arc<AtomicU64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator that will never issue a value at or below `last`.
    pub fn starting_after(last: u64) -> Self {
        Self {
            last: Arc::new(AtomicU64::new(last)),
        }
    }

    pub fn next(&self) -> u64 {
        self.next_at_least(now_millis())
    }

    /// Next value that is at least `floor` and above everything issued so far.
    pub fn next_at_least(&self, floor: u64) -> u64 {
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(floor.max(last.saturating_add(1)))
            })
            .unwrap_or_else(|last| last);
        floor.max(previous.saturating_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictly_increasing() {
        let ids = IdGenerator::new();
        let mut last = 0;
        for _ in 0..1000 {
            let id = ids.next();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn test_follows_clock_when_ahead() {
        let ids = IdGenerator::starting_after(10);
        assert_eq!(ids.next_at_least(500), 500);
        assert_eq!(ids.next_at_least(500), 501);
        assert_eq!(ids.next_at_least(100), 502);
    }

    #[test]
    fn test_clones_share_sequence() {
        let ids = IdGenerator::starting_after(41);
        let clone = ids.clone();
        assert_eq!(ids.next_at_least(0), 42);
        assert_eq!(clone.next_at_least(0), 43);
    }
}
