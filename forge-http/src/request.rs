use std::collections::BTreeMap;

use crate::definition::{HttpMethod, RouteDefinition, Scalar};

/// The abstract shape the router consumes, standing in for the PSR-7
/// message layer `spec.md` §1 puts out of scope. Any real transport
/// (an axum `Request`, a test fake) implements this.
pub trait RequestLike {
    fn method(&self) -> HttpMethod;
    fn path(&self) -> &str;
    fn host(&self) -> Option<&str>;
}

/// The abstract response shape the application façade produces.
pub trait ResponseLike {
    fn status(&self) -> u16;
}

/// Explicit context struct replacing PSR-7's `withAttribute` mutation
/// chain per `spec.md` §9: handlers read matched route data directly
/// instead of threading an immutable, copy-on-write request through
/// layers of attribute merges.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub route: Option<RouteHandle>,
    pub params: BTreeMap<String, String>,
    pub defaults: BTreeMap<String, Scalar>,
}

impl RequestContext {
    pub fn empty() -> Self {
        Self {
            route: None,
            params: BTreeMap::new(),
            defaults: BTreeMap::new(),
        }
    }
}

/// A cheap, cloneable reference to the matched route's identity, kept
/// separate from [`RouteDefinition`] itself so `RequestContext` stays
/// small to pass by value through a request's lifetime.
#[derive(Debug, Clone)]
pub struct RouteHandle {
    pub name: Option<String>,
    pub path: String,
}

impl From<&RouteDefinition> for RouteHandle {
    fn from(def: &RouteDefinition) -> Self {
        RouteHandle { name: def.name.clone(), path: def.path.clone() }
    }
}
