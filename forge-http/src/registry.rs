use crate::definition::{HandlerRef, RouteDefinition};

/// Per-bootstrap isolated buffer of route declarations. No process-wide
/// state: every [`RouteRegistry`] is a fresh value, matching
/// `spec.md` §4.5's "no process-wide state" and §4.8's "each invocation
/// gets a fresh registry."
#[derive(Default)]
pub struct RouteRegistry {
    pub(crate) routes: Vec<RouteDefinition>,
    fallback: Option<HandlerRef>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, route: RouteDefinition) {
        self.routes.push(route);
    }

    pub fn set_fallback(&mut self, handler: HandlerRef) {
        self.fallback = Some(handler);
    }

    pub fn fallback(&self) -> Option<&HandlerRef> {
        self.fallback.as_ref()
    }

    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    pub fn into_routes(self) -> (Vec<RouteDefinition>, Option<HandlerRef>) {
        (self.routes, self.fallback)
    }

    /// Run `f` against a fresh registry, guaranteeing that whatever `f`
    /// buffers is isolated from any other call — including when `f`
    /// panics, since the temporary registry and its buffered routes are
    /// simply dropped rather than leaking into `self`.
    pub fn scoped<F, T>(f: F) -> T
    where
        F: FnOnce(&mut RouteRegistry) -> T,
    {
        let mut scratch = RouteRegistry::new();
        f(&mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{HttpMethod, MethodSet};
    use crate::path::PathValidator;
    use std::collections::BTreeMap;

    fn route(path: &str) -> RouteDefinition {
        RouteDefinition {
            methods: MethodSet::Some(vec![HttpMethod::Get]),
            path: path.to_string(),
            path_pattern: PathValidator::compile(path).unwrap(),
            action: HandlerRef::Named("noop".into()),
            middleware: vec![],
            defaults: BTreeMap::new(),
            attributes: BTreeMap::new(),
            constraints: BTreeMap::new(),
            domain: None,
            domain_pattern: None,
            name: None,
            authorization: None,
        }
    }

    #[test]
    fn scoped_leaves_no_residue_on_panic() {
        let result = std::panic::catch_unwind(|| {
            RouteRegistry::scoped(|reg| {
                reg.push(route("/a"));
                panic!("boom");
            })
        });
        assert!(result.is_err());

        // A fresh scoped call sees no routes from the panicking one.
        let count = RouteRegistry::scoped(|reg| reg.routes().len());
        assert_eq!(count, 0);
    }

    #[test]
    fn push_accumulates_in_declaration_order() {
        let mut reg = RouteRegistry::new();
        reg.push(route("/a"));
        reg.push(route("/b"));
        let paths: Vec<_> = reg.routes().iter().map(|r| r.path.clone()).collect();
        assert_eq!(paths, vec!["/a".to_string(), "/b".to_string()]);
    }
}
