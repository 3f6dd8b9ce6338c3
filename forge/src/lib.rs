//! Facade crate wiring the DI kernel ([`forge_core`]), the HTTP router
//! ([`forge_http`]) and the query builder ([`forge_data`], optionally
//! backed by [`forge_data_sqlx`]) into one [`application::Application`]
//! lifecycle.

pub mod application;

pub use application::{Application, ApplicationError, ApplicationState, Provider};

pub use forge_core;
pub use forge_cache;
pub use forge_http;
pub use forge_data;
#[cfg(feature = "data-sqlx")]
pub use forge_data_sqlx;
pub use forge_utils;

pub mod prelude {
    pub use crate::{Application, ApplicationError, ApplicationState, Provider};
    pub use forge_core::prelude::*;
    pub use forge_data::prelude::*;
    // `forge_http::prelude` also exports a `Scalar` (a route attribute
    // value, distinct from forge-data's SQL `Scalar`), so it's picked
    // apart here instead of glob-imported to avoid an ambiguous name.
    pub use forge_http::prelude::{
        ControllerRoutes, HandlerRef, HttpMethod, HttpRequestRouter, Matched, MethodSet,
        RequestContext, RequestLike, ResponseLike, RouteDefinition, RouteGroupContext,
        RouteRegistry, RouterDsl, RoutingError,
    };
    pub use forge_http::Scalar as RouteScalar;
    #[cfg(feature = "data-sqlx")]
    pub use forge_data_sqlx::prelude::{
        ExecOutcome, Executor, PretendExecutor, QueryOrchestrator, SqlxErrorExt, SqlxExecutor, SqlxResult,
    };
    pub use forge_utils::prelude::*;
}
