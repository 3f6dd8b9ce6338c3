use std::sync::Arc;
use std::time::Instant;

use forge_core::telemetry::{TelemetryEvent, TelemetrySink};

/// Log level for [`Logged`], mirroring the teacher's interceptor-level
/// enum without the async `Interceptor` trait machinery it hangs off —
/// the kernel/router/query layers here are synchronous, so these wrap
/// plain closures instead of intercepting a method call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fn log_at_level(level: LogLevel, label: &str, msg: &str) {
    match level {
        LogLevel::Trace => tracing::trace!(label, "{msg}"),
        LogLevel::Debug => tracing::debug!(label, "{msg}"),
        LogLevel::Info => tracing::info!(label, "{msg}"),
        LogLevel::Warn => tracing::warn!(label, "{msg}"),
        LogLevel::Error => tracing::error!(label, "{msg}"),
    }
}

/// Logs entry and exit of a call at the configured level.
pub struct Logged {
    pub level: LogLevel,
    pub label: &'static str,
}

impl Logged {
    pub fn new(label: &'static str) -> Self {
        Self { level: LogLevel::Info, label }
    }

    pub fn at(label: &'static str, level: LogLevel) -> Self {
        Self { level, label }
    }

    pub fn call<T>(&self, f: impl FnOnce() -> T) -> T {
        log_at_level(self.level, self.label, "entering");
        let result = f();
        log_at_level(self.level, self.label, "exiting");
        result
    }
}

/// Measures a call's wall time and records it to a [`TelemetrySink`] as
/// an `Observation`, bridging the kernel/router/query layers' internal
/// timings into the same sink the router and query orchestrator already
/// write through. `threshold_ms`, when set, only records calls at or
/// above it, mirroring the teacher's `Timed::threshold` gate.
pub struct Timed {
    pub metric: String,
    pub sink: Arc<dyn TelemetrySink>,
    pub threshold_ms: Option<u64>,
}

impl Timed {
    pub fn new(metric: impl Into<String>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self { metric: metric.into(), sink, threshold_ms: None }
    }

    pub fn with_threshold(mut self, ms: u64) -> Self {
        self.threshold_ms = Some(ms);
        self
    }

    pub fn call<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let should_record = match self.threshold_ms {
            Some(threshold) => elapsed_ms >= threshold as f64,
            None => true,
        };
        if should_record {
            self.sink.record(TelemetryEvent::Observation { metric: self.metric.clone(), value: elapsed_ms });
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TelemetryEvent>>,
    }

    impl TelemetrySink for RecordingSink {
        fn record(&self, event: TelemetryEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn timed_records_observation_with_no_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let timed = Timed::new("kernel.resolve", sink.clone());
        let value = timed.call(|| 7);
        assert_eq!(value, 7);
        assert_eq!(sink.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn timed_skips_recording_below_threshold() {
        let sink = Arc::new(RecordingSink::default());
        let timed = Timed::new("router.resolve", sink.clone()).with_threshold(u64::MAX);
        timed.call(|| ());
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn logged_passes_through_return_value() {
        let logged = Logged::new("query.compile");
        assert_eq!(logged.call(|| "sql"), "sql");
    }
}
