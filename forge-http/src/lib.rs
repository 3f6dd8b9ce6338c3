//! HTTP routing engine for Forge.
//!
//! A fluent [`dsl`] builds an owned [`registry::RouteRegistry`] of
//! compiled [`definition::RouteDefinition`]s ([`path`] and [`domain`]
//! patterns), a [`engine::HttpRequestRouter`] matches incoming requests
//! against it, and [`export`] serializes the exportable subset to a
//! [`forge_cache::CacheBackend`] so a later bootstrap can skip
//! recompiling every pattern.

pub mod definition;
pub mod domain;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod export;
pub mod path;
pub mod registry;
pub mod request;

pub use definition::{HandlerRef, HttpMethod, MethodSet, RouteDefinition, RouteGroupContext, Scalar};
pub use domain::{CompiledDomain, DomainCompiler};
pub use dsl::{AttributeRoute, ControllerRoutes, GroupStack, RouteBuilder, RouterDsl};
pub use engine::{HttpRequestRouter, Matched};
pub use error::RoutingError;
pub use export::{ExportValidator, RouteCache, RouteExport, RouteTableExport};
pub use path::{CompiledPath, PathValidator};
pub use registry::RouteRegistry;
pub use request::{RequestContext, RequestLike, ResponseLike, RouteHandle};

pub mod prelude {
    pub use crate::{
        ControllerRoutes, HandlerRef, HttpMethod, HttpRequestRouter, Matched, MethodSet,
        RequestContext, RequestLike, ResponseLike, RouteDefinition, RouteGroupContext,
        RouteRegistry, RouterDsl, RoutingError, Scalar,
    };
}
