use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Immutable operational configuration for a container.
///
/// Built once via [`ContainerConfigBuilder`] and never mutated after;
/// every "change" produces a new value, matching the
/// readonly-with-`with*`-methods pattern `spec.md` §9 calls for.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub cache_dir: Option<PathBuf>,
    pub prototype_cache_dir: Option<PathBuf>,
    pub debug: bool,
    pub strict: bool,
    pub telemetry_enabled: bool,
    pub max_resolution_depth: usize,
    pub compile: bool,
    pub allowed_namespaces: BTreeSet<String>,
}

impl ContainerConfig {
    pub fn builder() -> ContainerConfigBuilder {
        ContainerConfigBuilder::default()
    }

    /// Overlay environment variables under the `FORGE_` prefix onto an
    /// existing config, generalizing the teacher's `app.database.url`
    /// <-> `APP_DATABASE_URL` convention to `forge.*` <-> `FORGE_*`.
    /// Only recognizes the handful of scalar switches this config
    /// exposes; unknown keys are ignored rather than erroring, since the
    /// environment may carry unrelated `FORGE_*` variables.
    pub fn apply_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Ok(v) = std::env::var("FORGE_DEBUG") {
            self.debug = parse_bool(&v, "FORGE_DEBUG")?;
        }
        if let Ok(v) = std::env::var("FORGE_STRICT") {
            self.strict = parse_bool(&v, "FORGE_STRICT")?;
        }
        if let Ok(v) = std::env::var("FORGE_TELEMETRY_ENABLED") {
            self.telemetry_enabled = parse_bool(&v, "FORGE_TELEMETRY_ENABLED")?;
        }
        if let Ok(v) = std::env::var("FORGE_MAX_RESOLUTION_DEPTH") {
            self.max_resolution_depth = v.parse().map_err(|_| ConfigError::TypeMismatch {
                key: "FORGE_MAX_RESOLUTION_DEPTH".into(),
                expected: "usize",
            })?;
        }
        if let Ok(v) = std::env::var("FORGE_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(v));
        }
        Ok(self)
    }
}

fn parse_bool(v: &str, key: &str) -> Result<bool, ConfigError> {
    match v {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::TypeMismatch { key: key.into(), expected: "bool" }),
    }
}

#[derive(Debug, Default)]
pub struct ContainerConfigBuilder {
    cache_dir: Option<PathBuf>,
    prototype_cache_dir: Option<PathBuf>,
    debug: bool,
    strict: bool,
    telemetry_enabled: bool,
    max_resolution_depth: Option<usize>,
    compile: bool,
    allowed_namespaces: BTreeSet<String>,
}

impl ContainerConfigBuilder {
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn prototype_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prototype_cache_dir = Some(dir.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    pub fn max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = Some(depth);
        self
    }

    pub fn compile(mut self, compile: bool) -> Self {
        self.compile = compile;
        self
    }

    pub fn allow_namespace(mut self, ns: impl Into<String>) -> Self {
        self.allowed_namespaces.insert(ns.into());
        self
    }

    pub fn build(self) -> ContainerConfig {
        ContainerConfig {
            cache_dir: self.cache_dir,
            prototype_cache_dir: self.prototype_cache_dir,
            debug: self.debug,
            strict: self.strict,
            telemetry_enabled: self.telemetry_enabled,
            max_resolution_depth: self.max_resolution_depth.unwrap_or(64),
            compile: self.compile,
            allowed_namespaces: self.allowed_namespaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_is_pure_and_stable_between_calls() {
        let a = ContainerConfig::builder().strict(true).build();
        let b = ContainerConfig::builder().strict(true).build();
        assert_eq!(a.strict, b.strict);
        assert_eq!(a.max_resolution_depth, b.max_resolution_depth);
    }

    #[test]
    fn default_max_depth_is_sane() {
        let cfg = ContainerConfig::builder().build();
        assert_eq!(cfg.max_resolution_depth, 64);
    }
}
