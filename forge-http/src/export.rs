use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use forge_cache::CacheBackend;

use crate::definition::{HandlerRef, HttpMethod, MethodSet, RouteDefinition, Scalar};
use crate::domain::DomainCompiler;
use crate::error::RoutingError;
use crate::path::PathValidator;
use crate::registry::RouteRegistry;

/// The on-disk format version. Bumping this invalidates every prior
/// cache entry without requiring a migration: `RouteCache::load` simply
/// refuses to accept a mismatched version.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScalarExport {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl From<&Scalar> for ScalarExport {
    fn from(s: &Scalar) -> Self {
        match s {
            Scalar::Str(v) => ScalarExport::Str(v.clone()),
            Scalar::Int(v) => ScalarExport::Int(*v),
            Scalar::Float(v) => ScalarExport::Float(*v),
            Scalar::Bool(v) => ScalarExport::Bool(*v),
            Scalar::Null => ScalarExport::Null,
        }
    }
}

impl From<&ScalarExport> for Scalar {
    fn from(s: &ScalarExport) -> Self {
        match s {
            ScalarExport::Str(v) => Scalar::Str(v.clone()),
            ScalarExport::Int(v) => Scalar::Int(*v),
            ScalarExport::Float(v) => Scalar::Float(*v),
            ScalarExport::Bool(v) => Scalar::Bool(*v),
            ScalarExport::Null => Scalar::Null,
        }
    }
}

/// The serializable shape of one route. Only exportable handlers
/// (`spec.md` §4.8: a name or a `[controller, method]` pair, never a
/// live closure) round-trip through this; `ExportValidator` enforces
/// that up front.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteExport {
    pub methods: Vec<String>,
    pub path: String,
    pub action: ActionExport,
    pub middleware: Vec<String>,
    pub defaults: BTreeMap<String, ScalarExport>,
    pub attributes: BTreeMap<String, ScalarExport>,
    pub domain: Option<String>,
    pub name: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionExport {
    Named { name: String },
    Controller { controller: String, method: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteTableExport {
    pub version: u32,
    pub routes: Vec<RouteExport>,
}

impl RouteTableExport {
    /// Recompiles every exported route's path (and domain) pattern and
    /// rebuilds a [`RouteRegistry`], matching `spec.md` §4.8's "on load,
    /// the router replaces its in-memory definitions with the cached
    /// set". Route-level constraints aren't part of the exported shape
    /// (`spec.md`'s export field list omits them), so a cache-loaded
    /// route answers to its path/method/domain pattern only.
    pub fn into_registry(&self) -> Result<RouteRegistry, RoutingError> {
        let mut registry = RouteRegistry::new();
        for route in &self.routes {
            let methods = MethodSet::Some(
                route
                    .methods
                    .iter()
                    .map(|m| {
                        HttpMethod::parse(m).ok_or_else(|| RoutingError::UnsupportedMethod { method: m.clone() })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            );
            let path_pattern = PathValidator::compile(&route.path)?;
            let domain_pattern = match &route.domain {
                Some(d) => Some(DomainCompiler::compile(d)?),
                None => None,
            };
            let action = match &route.action {
                ActionExport::Named { name } => HandlerRef::Named(name.clone()),
                ActionExport::Controller { controller, method } => {
                    HandlerRef::Controller { controller: controller.clone(), method: method.clone() }
                }
            };
            registry.push(RouteDefinition {
                methods,
                path: route.path.clone(),
                path_pattern,
                action,
                middleware: route.middleware.clone(),
                defaults: route.defaults.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
                attributes: route.attributes.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
                constraints: BTreeMap::new(),
                domain: route.domain.clone(),
                domain_pattern,
                name: route.name.clone(),
                authorization: route.authorization.clone(),
            });
        }
        Ok(registry)
    }
}

/// Refuses to export a registry that contains a non-exportable handler,
/// matching `spec.md` §4.8's "compile-time" guarantee that a closure
/// route can never reach the cache.
pub struct ExportValidator;

impl ExportValidator {
    pub fn validate(routes: &[RouteDefinition]) -> Result<Vec<RouteExport>, RoutingError> {
        routes.iter().map(Self::export_one).collect()
    }

    fn export_one(route: &RouteDefinition) -> Result<RouteExport, RoutingError> {
        let action = match &route.action {
            HandlerRef::Named(name) => ActionExport::Named { name: name.clone() },
            HandlerRef::Controller { controller, method } => {
                ActionExport::Controller { controller: controller.clone(), method: method.clone() }
            }
            HandlerRef::Closure(_) => {
                return Err(RoutingError::InvalidPath {
                    path: route.path.clone(),
                    reason: "closure handlers are not exportable".into(),
                })
            }
        };

        Ok(RouteExport {
            methods: route.methods.allowed_names(),
            path: route.path.clone(),
            action,
            middleware: route.middleware.clone(),
            defaults: route.defaults.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            attributes: route.attributes.iter().map(|(k, v)| (k.clone(), v.into())).collect(),
            domain: route.domain.clone(),
            name: route.name.clone(),
            authorization: route.authorization.clone(),
        })
    }
}

/// Thin wrapper around a [`CacheBackend`] storing the exported route
/// table under one fixed key, versioned so a format change degrades to
/// a cache miss instead of a corrupt read.
///
/// Generic rather than a trait object: `CacheBackend::get`/`set` require
/// `Self: Sized`, since they're generic over the deserialized type.
pub struct RouteCache<'a, B: CacheBackend> {
    backend: &'a B,
    key: String,
}

impl<'a, B: CacheBackend> RouteCache<'a, B> {
    pub fn new(backend: &'a B, key: impl Into<String>) -> Self {
        Self { backend, key: key.into() }
    }

    pub fn store(&self, routes: &[RouteDefinition]) -> Result<(), RoutingError> {
        let exported = ExportValidator::validate(routes)?;
        let table = RouteTableExport { version: EXPORT_FORMAT_VERSION, routes: exported };
        self.backend
            .set(&self.key, &table)
            .map_err(|e| RoutingError::InvalidPath { path: self.key.clone(), reason: e.to_string() })
    }

    /// Returns `None` on a cache miss or a version mismatch; both are
    /// treated as "recompute routes", never as an error.
    pub fn load(&self) -> Option<RouteTableExport> {
        let table: RouteTableExport = self.backend.get(&self.key).ok()??;
        if table.version != EXPORT_FORMAT_VERSION {
            return None;
        }
        Some(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::RouterDsl;
    use forge_cache::NullBackend;
    use std::sync::Arc;

    fn exportable_registry() -> Vec<RouteDefinition> {
        let mut dsl = RouterDsl::new();
        dsl.get("/users/{id}", HandlerRef::Named("show".into())).unwrap().name("users.show");
        dsl.post(
            "/users",
            HandlerRef::Controller { controller: "UserController".into(), method: "create".into() },
        )
        .unwrap();
        dsl.into_registry().into_routes().0
    }

    #[test]
    fn closure_handler_is_rejected_at_export() {
        let mut dsl = RouterDsl::new();
        dsl.get("/x", HandlerRef::Closure(Arc::new(|| ()))).unwrap();
        let routes = dsl.into_registry().into_routes().0;
        assert!(matches!(ExportValidator::validate(&routes), Err(RoutingError::InvalidPath { .. })));
    }

    #[test]
    fn exportable_registry_round_trips_through_named_and_controller_actions() {
        let routes = exportable_registry();
        let exported = ExportValidator::validate(&routes).unwrap();
        assert_eq!(exported.len(), 2);
        assert!(matches!(exported[0].action, ActionExport::Named { .. }));
        assert!(matches!(exported[1].action, ActionExport::Controller { .. }));
    }

    #[test]
    fn cache_miss_on_null_backend() {
        let backend = NullBackend;
        let cache = RouteCache::new(&backend, "routes");
        let routes = exportable_registry();
        cache.store(&routes).unwrap();
        assert!(cache.load().is_none());
    }

    #[test]
    fn version_mismatch_is_treated_as_miss() {
        let dir = std::env::temp_dir().join(format!("forge-http-export-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let backend = forge_cache::FileBackend::new(&dir, "json");
        let cache = RouteCache::new(&backend, "routes");
        let routes = exportable_registry();
        cache.store(&routes).unwrap();

        let mut stale = cache.load().unwrap();
        stale.version = EXPORT_FORMAT_VERSION + 1;
        backend.set("routes", &stale).unwrap();
        assert!(cache.load().is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn httpmethod_all_round_trips_through_allowed_names() {
        for m in HttpMethod::ALL {
            assert!(!m.as_str().is_empty());
        }
    }

    #[test]
    fn exported_table_rebuilds_a_matching_registry() {
        let routes = exportable_registry();
        let exported = ExportValidator::validate(&routes).unwrap();
        let table = RouteTableExport { version: EXPORT_FORMAT_VERSION, routes: exported };
        let reloaded = table.into_registry().unwrap();
        let (routes, _) = reloaded.into_routes();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].name.as_deref(), Some("users.show"));
        assert!(routes[0].path_pattern.param_names.contains(&"id".to_string()));
    }
}
