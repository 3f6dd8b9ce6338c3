//! Dependency-injection kernel for Forge.
//!
//! Three pieces compose into the resolution pipeline: a [`blueprint`]
//! analyzer standing in for reflection, a [`scope`] registry holding
//! scoped/singleton instances, and a [`kernel`] that walks the 7-step
//! pipeline over both. [`config`] and [`profile`] provide the immutable
//! settings that drive strictness and telemetry; [`telemetry`] defines
//! the sink contracts both the router and query layers also write
//! through.

pub mod blueprint;
pub mod config;
pub mod definition;
pub mod error;
pub mod kernel;
pub mod profile;
pub mod scope;
pub mod telemetry;

pub use definition::{type_ref, Factory, Lifetime, Producer, ServiceDefinition, ServiceId, TypeRef};
pub use error::{BlueprintError, ConfigError, ContainerError};
pub use kernel::{Container, ResolutionContext};
pub use profile::{BootstrapProfile, TelemetryConfig, TelemetrySinkKind};
pub use telemetry::{FileSink, LoggerSink, NullSink, SampledSink, TelemetryEvent, TelemetrySink};

pub mod prelude {
    pub use crate::blueprint::{BlueprintAnalyzer, BlueprintProducer, Inspectable, ServicePrototype};
    pub use crate::config::ContainerConfig;
    pub use crate::scope::ScopeRegistry;
    pub use crate::{
        BootstrapProfile, Container, ContainerError, Factory, Lifetime, Producer,
        ResolutionContext, ServiceDefinition, ServiceId, TelemetryConfig, TelemetryEvent,
        TelemetrySink, TypeRef,
    };
}
