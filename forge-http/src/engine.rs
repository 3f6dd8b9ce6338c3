use std::sync::Arc;
use std::time::Instant;

use forge_core::telemetry::{TelemetryEvent, TelemetrySink};

use crate::definition::{HandlerRef, HttpMethod, RouteDefinition, Scalar};
use crate::error::RoutingError;
use crate::path::normalize;
use crate::registry::RouteRegistry;
use crate::request::{RequestContext, RequestLike, RouteHandle};

/// Outcome of a successful match: the matched route plus the request
/// context carrying extracted parameters merged with defaults.
pub struct Matched<'a> {
    pub route: &'a RouteDefinition,
    pub context: RequestContext,
}

/// Holds compiled route definitions and an optional fallback handler;
/// resolves incoming requests per the deterministic algorithm in
/// `spec.md` §4.6.
pub struct HttpRequestRouter {
    routes: Vec<RouteDefinition>,
    fallback: Option<HandlerRef>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl HttpRequestRouter {
    pub fn from_registry(registry: RouteRegistry, telemetry: Arc<dyn TelemetrySink>) -> Self {
        let (routes, fallback) = registry.into_routes();
        Self { routes, fallback, telemetry }
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn resolve<R: RequestLike>(&self, request: &R) -> Result<Matched<'_>, RoutingError> {
        let start = Instant::now();
        let result = self.resolve_for_method(request.method(), request.path(), request.host());

        let result = if result.is_err() && request.method() == HttpMethod::Head {
            // HEAD -> GET fallback: retry with GET; caller discards body.
            match self.resolve_for_method(HttpMethod::Get, request.path(), request.host()) {
                Ok(m) => Ok(m),
                Err(_) => result,
            }
        } else {
            result
        };

        let strategy = match &result {
            Ok(_) => "matched",
            Err(RoutingError::RouteNotFound) if self.fallback.is_some() => "fallback",
            Err(_) => "missed",
        };
        self.telemetry.record(TelemetryEvent::Resolution {
            service_id: request.path().to_string(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            strategy: strategy.to_string(),
        });

        result
    }

    fn resolve_for_method(&self, method: HttpMethod, path: &str, host: Option<&str>) -> Result<Matched<'_>, RoutingError> {
        let normalized = normalize(path);
        let mut method_mismatch_found = false;
        let mut allowed: Vec<String> = Vec::new();

        for route in &self.routes {
            if let Some(domain_pattern) = &route.domain_pattern {
                let Some(host) = host else { continue };
                if !domain_pattern.regex.is_match(host) {
                    continue;
                }
            }

            if !route.methods.matches(method) {
                method_mismatch_found = true;
                for name in route.methods.allowed_names() {
                    if !allowed.contains(&name) {
                        allowed.push(name);
                    }
                }
                continue;
            }

            let Some(captures) = route.path_pattern.regex.captures(&normalized) else {
                continue;
            };

            let mut params = std::collections::BTreeMap::new();
            for name in &route.path_pattern.param_names {
                if let Some(m) = captures.name(name) {
                    params.insert(name.clone(), m.as_str().to_string());
                }
            }

            if let Some((failing_param, _)) = route
                .constraints
                .iter()
                .find(|(name, re)| params.get(*name).map(|v| !re.is_match(v)).unwrap_or(false))
            {
                let _ = failing_param;
                continue;
            }

            return Ok(Matched {
                route,
                context: RequestContext {
                    route: Some(RouteHandle::from(route)),
                    params,
                    defaults: route.defaults.clone(),
                },
            });
        }

        if method_mismatch_found {
            return Err(RoutingError::MethodNotAllowed { allowed });
        }
        Err(RoutingError::RouteNotFound)
    }

    pub fn fallback(&self) -> Option<&HandlerRef> {
        self.fallback.as_ref()
    }
}

pub fn merge_params_into_defaults(
    params: &std::collections::BTreeMap<String, String>,
    defaults: &std::collections::BTreeMap<String, Scalar>,
) -> std::collections::BTreeMap<String, Scalar> {
    let mut merged = defaults.clone();
    for (k, v) in params {
        merged.entry(k.clone()).or_insert_with(|| Scalar::Str(v.clone()));
    }
    merged
}
