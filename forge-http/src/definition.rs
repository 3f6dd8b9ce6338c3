use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::CompiledDomain;
use crate::path::CompiledPath;

/// Closed enumeration of HTTP methods, replacing the source's magic
/// `__call` dispatch per `spec.md` §9.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    pub fn parse(s: &str) -> Option<HttpMethod> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            _ => None,
        }
    }
}

/// What set of methods a route answers to. `Any` matches every
/// [`HttpMethod::ALL`] entry but never matches the literal string `ANY`.
#[derive(Debug, Clone)]
pub enum MethodSet {
    Any,
    Some(Vec<HttpMethod>),
}

impl MethodSet {
    pub fn matches(&self, method: HttpMethod) -> bool {
        match self {
            MethodSet::Any => true,
            MethodSet::Some(methods) => methods.contains(&method),
        }
    }

    pub fn allowed_names(&self) -> Vec<String> {
        match self {
            MethodSet::Any => HttpMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            MethodSet::Some(methods) => methods.iter().map(|m| m.as_str().to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// Either a bare handler name or a `(controller, method)` pair of
/// strings, matching `spec.md` §4.8's exportability rule: "a string or
/// a `[classRef, methodName]` tuple of strings (no closures, no live
/// objects)". `Closure` carries a live handler and is never exportable.
#[derive(Clone)]
pub enum HandlerRef {
    Named(String),
    Controller { controller: String, method: String },
    Closure(Arc<dyn Fn() -> () + Send + Sync>),
}

impl std::fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerRef::Named(n) => write!(f, "HandlerRef::Named({n})"),
            HandlerRef::Controller { controller, method } => {
                write!(f, "HandlerRef::Controller({controller}::{method})")
            }
            HandlerRef::Closure(_) => write!(f, "HandlerRef::Closure(..)"),
        }
    }
}

impl HandlerRef {
    pub fn is_exportable(&self) -> bool {
        !matches!(self, HandlerRef::Closure(_))
    }
}

/// A fully compiled route, produced by the DSL and held by the router
/// engine. `spec.md` §3's invariant holds by construction: `path` was
/// already run through [`crate::path::PathValidator`] before this value
/// exists.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub methods: MethodSet,
    pub path: String,
    pub path_pattern: CompiledPath,
    pub action: HandlerRef,
    pub middleware: Vec<String>,
    pub defaults: BTreeMap<String, Scalar>,
    pub attributes: BTreeMap<String, Scalar>,
    pub constraints: BTreeMap<String, regex::Regex>,
    pub domain: Option<String>,
    pub domain_pattern: Option<CompiledDomain>,
    pub name: Option<String>,
    pub authorization: Option<String>,
}

impl RouteDefinition {
    pub fn is_exportable(&self) -> bool {
        if !self.action.is_exportable() {
            return false;
        }
        // middleware is always Vec<String> by construction; defaults
        // and attributes are always scalar maps by construction. The
        // only remaining exportability gate is the handler itself.
        true
    }
}

/// Group-scoped declarative context: prefix/name prefix/middleware/
/// constraints/defaults/attributes/domain/authorization, stacked so
/// child builders inherit the concatenation of every ancestor.
#[derive(Debug, Clone, Default)]
pub struct RouteGroupContext {
    pub prefix: Option<String>,
    pub name_prefix: Option<String>,
    pub middleware: Vec<String>,
    pub constraints: BTreeMap<String, String>,
    pub defaults: BTreeMap<String, Scalar>,
    pub attributes: BTreeMap<String, Scalar>,
    pub domain: Option<String>,
    pub authorization: Option<String>,
}

impl RouteGroupContext {
    /// Merge `child` on top of `self` (the ancestor): prefixes/names
    /// concatenate left-to-right, middleware is unioned in order and
    /// deduplicated at compile time, and maps union with the child
    /// overriding the ancestor on key collision.
    pub fn merge_child(&self, child: &RouteGroupContext) -> RouteGroupContext {
        let prefix = match (&self.prefix, &child.prefix) {
            (Some(a), Some(b)) => Some(format!("{a}{b}")),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        let name_prefix = match (&self.name_prefix, &child.name_prefix) {
            (Some(a), Some(b)) => Some(format!("{a}{b}")),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };

        let mut middleware = self.middleware.clone();
        for m in &child.middleware {
            if !middleware.contains(m) {
                middleware.push(m.clone());
            }
        }

        let mut constraints = self.constraints.clone();
        constraints.extend(child.constraints.clone());
        let mut defaults = self.defaults.clone();
        defaults.extend(child.defaults.clone());
        let mut attributes = self.attributes.clone();
        attributes.extend(child.attributes.clone());

        RouteGroupContext {
            prefix,
            name_prefix,
            middleware,
            constraints,
            defaults,
            attributes,
            domain: child.domain.clone().or_else(|| self.domain.clone()),
            authorization: child.authorization.clone().or_else(|| self.authorization.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_named_method_but_not_literal_any() {
        assert!(MethodSet::Any.matches(HttpMethod::Get));
        assert!(MethodSet::Any.matches(HttpMethod::Post));
    }

    #[test]
    fn group_merge_concatenates_prefix_left_to_right() {
        let parent = RouteGroupContext {
            prefix: Some("/api".into()),
            ..Default::default()
        };
        let child = RouteGroupContext {
            prefix: Some("/v1".into()),
            ..Default::default()
        };
        let merged = parent.merge_child(&child);
        assert_eq!(merged.prefix, Some("/api/v1".into()));
    }

    #[test]
    fn group_merge_child_map_overrides_ancestor() {
        let mut parent_defaults = BTreeMap::new();
        parent_defaults.insert("tenant".to_string(), Scalar::Str("root".into()));
        let parent = RouteGroupContext { defaults: parent_defaults, ..Default::default() };

        let mut child_defaults = BTreeMap::new();
        child_defaults.insert("tenant".to_string(), Scalar::Str("acme".into()));
        let child = RouteGroupContext { defaults: child_defaults, ..Default::default() };

        let merged = parent.merge_child(&child);
        match &merged.defaults["tenant"] {
            Scalar::Str(s) => assert_eq!(s, "acme"),
            _ => panic!("expected string scalar"),
        }
    }

    #[test]
    fn group_merge_dedups_middleware() {
        let parent = RouteGroupContext { middleware: vec!["auth".into()], ..Default::default() };
        let child = RouteGroupContext { middleware: vec!["auth".into(), "log".into()], ..Default::default() };
        let merged = parent.merge_child(&child);
        assert_eq!(merged.middleware, vec!["auth".to_string(), "log".to_string()]);
    }

    #[test]
    fn closure_handler_is_not_exportable() {
        let handler = HandlerRef::Closure(Arc::new(|| ()));
        assert!(!handler.is_exportable());
        let named = HandlerRef::Named("ping".into());
        assert!(named.is_exportable());
    }
}
