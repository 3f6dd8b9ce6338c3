//! Cross-cutting instrumentation helpers shared by the kernel, router
//! and query layers: synchronous call wrappers that log and time,
//! built on `forge-core`'s telemetry sink rather than a bespoke metrics
//! path.

pub mod instrument;

pub use instrument::{LogLevel, Logged, Timed};

pub mod prelude {
    pub use crate::{LogLevel, Logged, Timed};
}
