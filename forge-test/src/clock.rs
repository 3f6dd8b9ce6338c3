use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A clock that advances only when told to, so tests asserting on
/// elapsed-time telemetry (route resolution timing, query orchestrator
/// timing) don't depend on wall time.
pub struct TestClock {
    elapsed: AtomicU64,
}

impl TestClock {
    pub fn new() -> Self {
        Self { elapsed: AtomicU64::new(0) }
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed.load(Ordering::SeqCst))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic id generator for tests that need stable identifiers
/// (route handles, identity-map keys) instead of a random or
/// time-derived one.
pub struct SequentialIds {
    next: AtomicU64,
    prefix: &'static str,
}

impl SequentialIds {
    pub fn new(prefix: &'static str) -> Self {
        Self { next: AtomicU64::new(1), prefix }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_advances_when_told() {
        let clock = TestClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        clock.advance(Duration::from_millis(50));
        assert_eq!(clock.elapsed(), Duration::from_millis(50));
    }

    #[test]
    fn sequential_ids_are_stable_and_ordered() {
        let ids = SequentialIds::new("svc");
        assert_eq!(ids.next_id(), "svc-1");
        assert_eq!(ids.next_id(), "svc-2");
    }
}
