use std::path::PathBuf;

use crate::config::ContainerConfig;
use crate::error::ConfigError;

/// Sink selection for [`TelemetryConfig`], mirroring
/// `crate::telemetry::TelemetrySink`'s three implementations without
/// pulling the concrete sink types (which need I/O) into a pure value.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TelemetrySinkKind {
    Null,
    File,
    Logger,
}

/// Immutable telemetry settings, paired with [`ContainerConfig`] inside
/// a [`BootstrapProfile`].
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub sink: TelemetrySinkKind,
    pub output_path: Option<PathBuf>,
    pub sample_rate: u64,
    pub include_stack_traces: bool,
    pub tracked_events: Vec<String>,
}

impl TelemetryConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            sink: TelemetrySinkKind::Null,
            output_path: None,
            sample_rate: 1,
            include_stack_traces: false,
            tracked_events: Vec::new(),
        }
    }
}

/// One of the four named environment presets from `spec.md` §6, bundling
/// a [`ContainerConfig`] and a [`TelemetryConfig`]. Presets are pure,
/// equal between calls, and produced with no I/O — satisfying the
/// testable property `config(p)` is pure for all `p`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BootstrapProfile {
    Development,
    Production,
    Testing,
    Staging,
}

impl BootstrapProfile {
    /// Resolve the active profile from `FORGE_PROFILE`, defaulting to
    /// `Development` when unset, mirroring the teacher's `R2E_PROFILE`
    /// convention in `r2e_core::config`.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("FORGE_PROFILE") {
            Ok(v) => Self::parse(&v),
            Err(_) => Ok(BootstrapProfile::Development),
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "development" | "dev" => Ok(BootstrapProfile::Development),
            "production" | "prod" => Ok(BootstrapProfile::Production),
            "testing" | "test" => Ok(BootstrapProfile::Testing),
            "staging" => Ok(BootstrapProfile::Staging),
            other => Err(ConfigError::Validation {
                reason: format!("unknown profile '{other}'"),
            }),
        }
    }

    pub fn container_config(&self) -> ContainerConfig {
        match self {
            BootstrapProfile::Development => ContainerConfig::builder()
                .debug(true)
                .strict(false)
                .telemetry_enabled(true)
                .cache_dir(std::env::temp_dir().join("forge-cache"))
                .build(),
            BootstrapProfile::Production => ContainerConfig::builder()
                .debug(false)
                .strict(true)
                .compile(true)
                .telemetry_enabled(true)
                .cache_dir(PathBuf::from("/var/cache/forge"))
                .build(),
            BootstrapProfile::Testing => ContainerConfig::builder()
                .debug(true)
                .strict(true)
                .telemetry_enabled(true)
                .cache_dir(std::env::temp_dir().join("forge-test-cache"))
                .build(),
            BootstrapProfile::Staging => ContainerConfig::builder()
                .debug(false)
                .strict(true)
                .compile(true)
                .telemetry_enabled(true)
                .cache_dir(PathBuf::from("/var/cache/forge"))
                .build(),
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        match self {
            BootstrapProfile::Development => TelemetryConfig {
                enabled: true,
                sink: TelemetrySinkKind::Logger,
                output_path: None,
                sample_rate: 1,
                include_stack_traces: true,
                tracked_events: vec!["resolution".into(), "route_match".into(), "query".into()],
            },
            BootstrapProfile::Production => TelemetryConfig {
                enabled: true,
                sink: TelemetrySinkKind::File,
                output_path: Some(PathBuf::from("/var/log/forge/telemetry.jsonl")),
                sample_rate: 20,
                include_stack_traces: false,
                tracked_events: vec!["resolution".into(), "route_match".into()],
            },
            BootstrapProfile::Testing => TelemetryConfig {
                enabled: true,
                sink: TelemetrySinkKind::Null,
                output_path: None,
                sample_rate: 1,
                include_stack_traces: true,
                tracked_events: vec!["resolution".into(), "route_match".into(), "query".into()],
            },
            BootstrapProfile::Staging => TelemetryConfig {
                enabled: true,
                sink: TelemetrySinkKind::File,
                output_path: Some(PathBuf::from("/var/log/forge/telemetry.jsonl")),
                sample_rate: 5,
                include_stack_traces: true,
                tracked_events: vec!["resolution".into(), "route_match".into(), "query".into()],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_presets_are_pure_and_stable() {
        let a = BootstrapProfile::Production.container_config();
        let b = BootstrapProfile::Production.container_config();
        assert_eq!(a.strict, b.strict);
        assert_eq!(a.compile, b.compile);
    }

    #[test]
    fn development_is_lenient() {
        let cfg = BootstrapProfile::Development.container_config();
        assert!(!cfg.strict);
        assert!(cfg.debug);
    }

    #[test]
    fn production_is_strict_and_compiled() {
        let cfg = BootstrapProfile::Production.container_config();
        assert!(cfg.strict);
        assert!(cfg.compile);
        assert!(!cfg.debug);
    }

    #[test]
    fn unknown_profile_name_rejected() {
        assert!(BootstrapProfile::parse("nonexistent").is_err());
    }
}
