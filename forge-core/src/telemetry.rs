use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A single recorded event: either a resolution timing or a metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetryEvent {
    Resolution {
        service_id: String,
        duration_ms: f64,
        strategy: String,
    },
    Counter { metric: String, value: f64 },
    Observation { metric: String, value: f64 },
}

/// Pluggable destination for telemetry events, matching `spec.md` §6's
/// `null`/`file`/`logger` sink trio.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Discards every event. Used in tests and wherever telemetry is
/// disabled, matching the null-object pattern used throughout for cache
/// and router fallback.
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: TelemetryEvent) {}
}

/// Appends each event as one JSON line to `path`, matching the
/// teacher's preference for plain serde-serialized on-disk formats.
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl TelemetrySink for FileSink {
    fn record(&self, event: TelemetryEvent) {
        let _guard = self.lock.lock().expect("telemetry file lock poisoned");
        let line = match serde_json::to_string(&event) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize telemetry event");
                return;
            }
        };
        let file = OpenOptions::new().create(true).append(true).open(&self.path);
        match file {
            Ok(mut f) => {
                if let Err(e) = writeln!(f, "{line}") {
                    tracing::warn!(error = %e, path = %self.path.display(), "failed to append telemetry event");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "failed to open telemetry sink file");
            }
        }
    }
}

/// Forwards events through `tracing`, the teacher's logging facade in
/// every crate that logs.
pub struct LoggerSink;

impl TelemetrySink for LoggerSink {
    fn record(&self, event: TelemetryEvent) {
        match &event {
            TelemetryEvent::Resolution { service_id, duration_ms, strategy } => {
                tracing::debug!(service_id, duration_ms, strategy, "resolution");
            }
            TelemetryEvent::Counter { metric, value } => {
                tracing::debug!(metric, value, "counter");
            }
            TelemetryEvent::Observation { metric, value } => {
                tracing::debug!(metric, value, "observation");
            }
        }
    }
}

/// Wraps a sink with a deterministic "record 1 in N" sampler, matching
/// `spec.md`'s `TelemetryConfig.sampleRate`.
pub struct SampledSink<S: TelemetrySink> {
    inner: S,
    sample_rate: u64,
    counter: AtomicU64,
}

impl<S: TelemetrySink> SampledSink<S> {
    /// `sample_rate` of 1 records everything; 0 is treated as 1 to
    /// avoid a division-by-zero degrading into silent drop-everything.
    pub fn new(inner: S, sample_rate: u64) -> Self {
        Self {
            inner,
            sample_rate: sample_rate.max(1),
            counter: AtomicU64::new(0),
        }
    }
}

impl<S: TelemetrySink> TelemetrySink for SampledSink<S> {
    fn record(&self, event: TelemetryEvent) {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        if n % self.sample_rate == 0 {
            self.inner.record(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    struct RecordingSink(StdMutex<Vec<TelemetryEvent>>);

    impl TelemetrySink for RecordingSink {
        fn record(&self, event: TelemetryEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn sampled_sink_records_every_nth() {
        let sink = SampledSink::new(RecordingSink(StdMutex::new(Vec::new())), 3);
        for i in 0..9 {
            sink.record(TelemetryEvent::Counter {
                metric: format!("m{i}"),
                value: i as f64,
            });
        }
        assert_eq!(sink.inner.0.lock().unwrap().len(), 3);
    }

    #[test]
    fn null_sink_discards() {
        let sink = NullSink;
        sink.record(TelemetryEvent::Counter { metric: "x".into(), value: 1.0 });
    }
}
