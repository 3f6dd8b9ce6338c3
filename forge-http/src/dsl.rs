use std::collections::BTreeMap;

use crate::definition::{HandlerRef, HttpMethod, MethodSet, RouteDefinition, RouteGroupContext, Scalar};
use crate::domain::DomainCompiler;
use crate::error::RoutingError;
use crate::path::PathValidator;
use crate::registry::RouteRegistry;

/// Stack of [`RouteGroupContext`] frames; child builders inherit the
/// concatenation of every ancestor via [`RouteGroupContext::merge_child`].
#[derive(Default)]
pub struct GroupStack {
    frames: Vec<RouteGroupContext>,
}

impl GroupStack {
    pub fn push(&mut self, ctx: RouteGroupContext) {
        let effective = match self.frames.last() {
            Some(parent) => parent.merge_child(&ctx),
            None => ctx,
        };
        self.frames.push(effective);
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn current(&self) -> Option<&RouteGroupContext> {
        self.frames.last()
    }

    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }
}

/// Fluent route registration surface. Buffers routes into an owned
/// [`RouteRegistry`]; never touches process-wide state.
pub struct RouterDsl {
    registry: RouteRegistry,
    groups: GroupStack,
}

/// In-progress route builder returned by each HTTP-method call; chains
/// back into the same underlying route entry.
pub struct RouteBuilder<'a> {
    dsl: &'a mut RouterDsl,
    index: usize,
}

impl RouterDsl {
    pub fn new() -> Self {
        Self { registry: RouteRegistry::new(), groups: GroupStack::default() }
    }

    pub fn registry(&self) -> &RouteRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> RouteRegistry {
        self.registry
    }

    fn register(&mut self, methods: MethodSet, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        if path.is_empty() {
            return Err(RoutingError::InvalidPath { path: path.to_string(), reason: "path must not be empty".into() });
        }
        let group = self.groups.current().cloned().unwrap_or_default();
        let full_path = match &group.prefix {
            Some(prefix) => format!("{prefix}{path}"),
            None => path.to_string(),
        };

        let path_pattern = PathValidator::compile(&full_path)?;
        let domain = group.domain.clone();
        let domain_pattern = match &domain {
            Some(d) => Some(DomainCompiler::compile(d)?),
            None => None,
        };

        let mut constraints = BTreeMap::new();
        for (k, pattern) in &group.constraints {
            let re = regex::Regex::new(pattern).map_err(|e| RoutingError::InvalidPath {
                path: full_path.clone(),
                reason: format!("invalid constraint for '{k}': {e}"),
            })?;
            constraints.insert(k.clone(), re);
        }

        let def = RouteDefinition {
            methods,
            path: full_path,
            path_pattern,
            action,
            middleware: group.middleware.clone(),
            defaults: group.defaults.clone(),
            attributes: group.attributes.clone(),
            constraints,
            domain,
            domain_pattern,
            name: group.name_prefix.clone(),
            authorization: group.authorization.clone(),
        };

        self.registry.push(def);
        let index = self.registry.routes().len() - 1;
        Ok(RouteBuilder { dsl: self, index })
    }

    fn method(&mut self, method: HttpMethod, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.register(MethodSet::Some(vec![method]), path, action)
    }

    pub fn get(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Get, path, action)
    }
    pub fn post(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Post, path, action)
    }
    pub fn put(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Put, path, action)
    }
    pub fn patch(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Patch, path, action)
    }
    pub fn delete(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Delete, path, action)
    }
    pub fn options(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Options, path, action)
    }
    pub fn head(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.method(HttpMethod::Head, path, action)
    }

    pub fn any(&mut self, path: &str, action: HandlerRef) -> Result<RouteBuilder<'_>, RoutingError> {
        self.register(MethodSet::Any, path, action)
    }

    /// Expands into one [`RouteDefinition`] per non-`Any` method,
    /// matching `spec.md` §4.7's `any_expanded`.
    pub fn any_expanded(&mut self, path: &str, action: HandlerRef) -> Result<(), RoutingError> {
        for m in HttpMethod::ALL {
            self.method(m, path, action.clone())?;
        }
        Ok(())
    }

    /// Resolve an HTTP method name against the closed enumeration,
    /// raising `UnsupportedMethod` for anything else, replacing the
    /// source's magic `__call` dispatch.
    pub fn dispatch(&mut self, method_name: &str, path: &str, action: HandlerRef) -> Result<(), RoutingError> {
        if method_name.eq_ignore_ascii_case("any") {
            self.any(path, action)?;
            return Ok(());
        }
        let method = HttpMethod::parse(method_name)
            .ok_or_else(|| RoutingError::UnsupportedMethod { method: method_name.to_string() })?;
        self.method(method, path, action)?;
        Ok(())
    }

    pub fn group<F>(&mut self, ctx: RouteGroupContext, f: F) -> Result<(), RoutingError>
    where
        F: FnOnce(&mut RouterDsl) -> Result<(), RoutingError>,
    {
        self.groups.push(ctx);
        let result = f(self);
        self.groups.pop();
        result
    }

    pub fn fallback(&mut self, handler: HandlerRef) {
        self.registry.set_fallback(handler);
    }

    /// Append middleware to the currently active group, failing with
    /// `NoActiveGroup` when called outside any `group(...)` call.
    pub fn current_group_middleware(&mut self, middleware: &str) -> Result<(), RoutingError> {
        if !self.groups.is_active() {
            return Err(RoutingError::NoActiveGroup);
        }
        if let Some(frame) = self.groups.frames.last_mut() {
            frame.middleware.push(middleware.to_string());
        }
        Ok(())
    }

    /// Attribute-driven route discovery: since Rust has no runtime
    /// attribute reflection, a controller opts in by implementing
    /// [`ControllerRoutes`] (the codegen-able stand-in `spec.md` §9
    /// calls for) and this walks its declarative descriptors.
    pub fn register_attributes<C: ControllerRoutes>(&mut self) -> Result<(), RoutingError> {
        for descriptor in C::routes() {
            self.dispatch(&descriptor.method, &descriptor.path, descriptor.action)?;
        }
        Ok(())
    }
}

impl Default for RouterDsl {
    fn default() -> Self {
        Self::new()
    }
}

/// One attribute-discovered route, as a controller would declare via a
/// codegen-emitted impl of [`ControllerRoutes`].
pub struct AttributeRoute {
    pub method: String,
    pub path: String,
    pub action: HandlerRef,
}

/// Codegen-able stand-in for attribute-based controller route
/// discovery: a controller implements this to expose its routes
/// declaratively instead of being scanned via reflection.
pub trait ControllerRoutes {
    fn routes() -> Vec<AttributeRoute>;
}

impl<'a> RouteBuilder<'a> {
    fn route_mut(&mut self) -> &mut RouteDefinition {
        &mut self.dsl.registry.routes[self.index]
    }

    /// Concatenates onto the route's inherited group name prefix,
    /// left-to-right, the same rule `RouteGroupContext::merge_child`
    /// applies to nested groups.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let route = self.route_mut();
        let name = name.into();
        route.name = Some(match route.name.take() {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        });
        self
    }

    pub fn middleware(mut self, mw: impl IntoIterator<Item = String>) -> Self {
        self.route_mut().middleware.extend(mw);
        self
    }

    pub fn where_constraint(mut self, param: &str, pattern: &str) -> Result<Self, RoutingError> {
        let re = regex::Regex::new(pattern).map_err(|e| RoutingError::InvalidPath {
            path: self.route_mut().path.clone(),
            reason: format!("invalid constraint for '{param}': {e}"),
        })?;
        self.route_mut().constraints.insert(param.to_string(), re);
        Ok(self)
    }

    pub fn defaults(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.route_mut().defaults.insert(key.into(), value);
        self
    }

    pub fn attributes(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.route_mut().attributes.insert(key.into(), value);
        self
    }

    pub fn authorization(mut self, policy: impl Into<String>) -> Self {
        self.route_mut().authorization = Some(policy.into());
        self
    }

    pub fn domain(mut self, host: &str) -> Result<Self, RoutingError> {
        let compiled = DomainCompiler::compile(host)?;
        self.route_mut().domain = Some(host.to_string());
        self.route_mut().domain_pattern = Some(compiled);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> HandlerRef {
        HandlerRef::Named("noop".into())
    }

    #[test]
    fn empty_path_is_invalid() {
        let mut dsl = RouterDsl::new();
        assert!(matches!(dsl.get("", noop()), Err(RoutingError::InvalidPath { .. })));
    }

    #[test]
    fn unsupported_method_name_rejected() {
        let mut dsl = RouterDsl::new();
        assert!(matches!(
            dsl.dispatch("TRACE", "/x", noop()),
            Err(RoutingError::UnsupportedMethod { .. })
        ));
    }

    #[test]
    fn group_prefix_and_middleware_applied_to_children() {
        let mut dsl = RouterDsl::new();
        dsl.group(
            RouteGroupContext { prefix: Some("/api".into()), middleware: vec!["auth".into()], ..Default::default() },
            |dsl| {
                dsl.get("/users", noop())?;
                Ok(())
            },
        )
        .unwrap();

        let routes = dsl.registry().routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/api/users");
        assert_eq!(routes[0].middleware, vec!["auth".to_string()]);
    }

    #[test]
    fn nested_groups_concatenate_prefixes() {
        let mut dsl = RouterDsl::new();
        dsl.group(RouteGroupContext { prefix: Some("/api".into()), ..Default::default() }, |outer| {
            outer.group(RouteGroupContext { prefix: Some("/v1".into()), ..Default::default() }, |inner| {
                inner.get("/ping", noop())?;
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(dsl.registry().routes()[0].path, "/api/v1/ping");
    }

    #[test]
    fn name_concatenates_onto_inherited_group_name_prefix() {
        let mut dsl = RouterDsl::new();
        dsl.group(RouteGroupContext { name_prefix: Some("users.".into()), ..Default::default() }, |inner| {
            inner.get("/show", noop())?.name("show");
            Ok(())
        })
        .unwrap();

        assert_eq!(dsl.registry().routes()[0].name.as_deref(), Some("users.show"));
    }

    #[test]
    fn group_only_operation_outside_group_fails() {
        let mut dsl = RouterDsl::new();
        assert!(matches!(dsl.current_group_middleware("auth"), Err(RoutingError::NoActiveGroup)));
    }

    #[test]
    fn group_stack_restores_after_nested_call() {
        let mut dsl = RouterDsl::new();
        dsl.group(RouteGroupContext { prefix: Some("/api".into()), ..Default::default() }, |inner| {
            inner.get("/a", noop())?;
            Ok(())
        })
        .unwrap();
        dsl.get("/b", noop()).unwrap();
        let routes = dsl.registry().routes();
        assert_eq!(routes[1].path, "/b");
    }

    #[test]
    fn any_expanded_creates_one_route_per_method() {
        let mut dsl = RouterDsl::new();
        dsl.any_expanded("/x", noop()).unwrap();
        assert_eq!(dsl.registry().routes().len(), HttpMethod::ALL.len());
    }
}
