use std::fmt;
use std::sync::Arc;

use forge_cache::{CacheBackend, NullBackend};
use forge_core::config::ContainerConfig;
use forge_core::profile::{BootstrapProfile, TelemetryConfig, TelemetrySinkKind};
use forge_core::telemetry::{FileSink, LoggerSink, NullSink, SampledSink, TelemetrySink};
use forge_core::{Container, ContainerError};
use forge_http::{HandlerRef, HttpRequestRouter, Matched, RequestLike, RouteCache, RouterDsl, RoutingError};

/// `spec.md` §4.9's state machine. Transitions only move forward; `run`
/// is only callable in `Booted` or `Running`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ApplicationState {
    Created,
    Registered,
    Booted,
    Running,
    Terminated,
}

#[derive(Debug)]
pub enum ApplicationError {
    AlreadyBooted,
    NotBooted,
    InvalidProvider { reason: String },
    MissingFallback,
    Container(ContainerError),
    Routing(RoutingError),
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationError::AlreadyBooted => write!(f, "application is already booted"),
            ApplicationError::NotBooted => write!(f, "application has not been booted yet"),
            ApplicationError::InvalidProvider { reason } => write!(f, "invalid provider: {reason}"),
            ApplicationError::MissingFallback => {
                write!(f, "no route matched and no fallback handler is configured")
            }
            ApplicationError::Container(e) => write!(f, "{e}"),
            ApplicationError::Routing(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ApplicationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApplicationError::Container(e) => Some(e),
            ApplicationError::Routing(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ContainerError> for ApplicationError {
    fn from(e: ContainerError) -> Self {
        ApplicationError::Container(e)
    }
}

impl From<RoutingError> for ApplicationError {
    fn from(e: RoutingError) -> Self {
        ApplicationError::Routing(e)
    }
}

/// Optional hook a registered component implements. `register` must
/// never resolve a service from the container (an invariant enforced
/// only by convention, as `spec.md` §4.9 states); `boot` runs once
/// resolution is safe.
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    fn register(&self, _container: &mut Container) {}

    fn boot(&self, _container: &Container) -> Result<(), ApplicationError> {
        Ok(())
    }
}

fn build_telemetry_sink(config: &TelemetryConfig) -> Arc<dyn TelemetrySink> {
    if !config.enabled {
        return Arc::new(NullSink);
    }
    match config.sink {
        TelemetrySinkKind::Null => Arc::new(NullSink),
        TelemetrySinkKind::Logger => {
            if config.sample_rate > 1 {
                Arc::new(SampledSink::new(LoggerSink, config.sample_rate))
            } else {
                Arc::new(LoggerSink)
            }
        }
        TelemetrySinkKind::File => {
            let path = config.output_path.clone().unwrap_or_else(|| std::env::temp_dir().join("forge-telemetry.jsonl"));
            let sink = FileSink::new(path);
            if config.sample_rate > 1 {
                Arc::new(SampledSink::new(sink, config.sample_rate))
            } else {
                Arc::new(sink)
            }
        }
    }
}

/// RAII guard ensuring `end_scope` runs on every exit path of
/// [`Application::run`], including an early return or a panic unwinding
/// through it, matching `spec.md` §5's "guaranteed release on all exit
/// paths" resource rule.
struct ScopeGuard<'a> {
    container: &'a Container,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.container.end_scope() {
            tracing::warn!(error = %e, "scope end failed during guard drop");
        }
    }
}

/// What [`Application::run`] hands to its dispatch closure: either a real
/// route match, or the router's fallback handler when nothing matched.
/// Resolving a [`HandlerRef`] to an actual call is the caller's job (the
/// same way it resolves `Matched::route.action`), so both arms carry one.
pub enum DispatchTarget<'a> {
    Matched(Matched<'a>),
    Fallback(&'a HandlerRef),
}

/// Ties the DI kernel, the HTTP router and an ordered provider list
/// into the lifecycle `spec.md` §4.9 describes: explicit providers (no
/// directory-scanning auto-discovery), register-then-boot, one scope
/// per `run()` call.
pub struct Application {
    container: Container,
    providers: Vec<Box<dyn Provider>>,
    router: Option<HttpRequestRouter>,
    telemetry: Arc<dyn TelemetrySink>,
    state: ApplicationState,
}

impl Application {
    pub fn new(config: ContainerConfig, telemetry_config: TelemetryConfig) -> Self {
        let telemetry = build_telemetry_sink(&telemetry_config);
        let container = Container::new(config).with_telemetry(telemetry.clone());
        Self {
            container,
            providers: Vec::new(),
            router: None,
            telemetry,
            state: ApplicationState::Created,
        }
    }

    pub fn from_profile(profile: BootstrapProfile) -> Self {
        Self::new(profile.container_config(), profile.telemetry_config())
    }

    pub fn state(&self) -> ApplicationState {
        self.state
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    pub fn telemetry(&self) -> Arc<dyn TelemetrySink> {
        self.telemetry.clone()
    }

    /// Appends `provider` to the ordered list and runs its `register`
    /// hook immediately. If the application already booted, also runs
    /// `boot` for this single provider right away, since every provider
    /// registered before `boot()` already had its turn.
    pub fn register(&mut self, provider: Box<dyn Provider>) -> Result<(), ApplicationError> {
        if self.state == ApplicationState::Terminated {
            return Err(ApplicationError::InvalidProvider {
                reason: "cannot register a provider after termination".into(),
            });
        }
        provider.register(&mut self.container);
        if self.state == ApplicationState::Booted || self.state == ApplicationState::Running {
            provider.boot(&self.container)?;
        }
        self.providers.push(provider);
        if self.state == ApplicationState::Created {
            self.state = ApplicationState::Registered;
        }
        Ok(())
    }

    /// Consults `cache` for a previously exported route table; on miss
    /// or version mismatch, runs `build` against a fresh [`RouterDsl`]
    /// and stores the exportable subset back into `cache`.
    pub fn load_routes<B, F>(&mut self, cache: &B, cache_key: &str, build: F) -> Result<(), ApplicationError>
    where
        B: CacheBackend,
        F: FnOnce(&mut RouterDsl) -> Result<(), RoutingError>,
    {
        let route_cache = RouteCache::new(cache, cache_key);
        let registry = match route_cache.load() {
            Some(table) => table.into_registry()?,
            None => {
                let mut dsl = RouterDsl::new();
                build(&mut dsl)?;
                let registry = dsl.into_registry();
                if let Err(e) = route_cache.store(registry.routes()) {
                    tracing::warn!(error = %e, "route export skipped, continuing with in-memory routes");
                }
                registry
            }
        };
        self.router = Some(HttpRequestRouter::from_registry(registry, self.telemetry.clone()));
        Ok(())
    }

    /// Load routes straight from a null backend, bypassing the cache
    /// entirely — the common path for tests and small apps.
    pub fn load_routes_uncached<F>(&mut self, build: F) -> Result<(), ApplicationError>
    where
        F: FnOnce(&mut RouterDsl) -> Result<(), RoutingError>,
    {
        self.load_routes(&NullBackend, "routes", build)
    }

    /// Runs each registered provider's `boot()` exactly once, in
    /// registration order.
    pub fn boot(&mut self) -> Result<(), ApplicationError> {
        if self.state == ApplicationState::Booted || self.state == ApplicationState::Running {
            return Err(ApplicationError::AlreadyBooted);
        }
        for provider in &self.providers {
            provider.boot(&self.container)?;
        }
        self.state = ApplicationState::Booted;
        Ok(())
    }

    /// `begin_scope -> ensure booted -> router.resolve -> dispatch ->
    /// (finally) end_scope`, matching `spec.md` §4.9. `dispatch` turns a
    /// successful match into a status code; when no route matches, the
    /// router's configured fallback (if any) is invoked through the same
    /// closure exactly once, otherwise this returns
    /// [`ApplicationError::MissingFallback`].
    pub fn run<R, F>(&mut self, request: &R, dispatch: F) -> Result<u16, ApplicationError>
    where
        R: RequestLike,
        F: FnOnce(DispatchTarget<'_>) -> u16,
    {
        if self.state != ApplicationState::Booted && self.state != ApplicationState::Running {
            return Err(ApplicationError::NotBooted);
        }
        let router = self.router.as_ref().ok_or(ApplicationError::NotBooted)?;

        self.container.begin_scope();
        let _guard = ScopeGuard { container: &self.container };
        self.state = ApplicationState::Running;

        match router.resolve(request) {
            Ok(matched) => Ok(dispatch(DispatchTarget::Matched(matched))),
            Err(RoutingError::RouteNotFound) => match router.fallback() {
                Some(handler) => Ok(dispatch(DispatchTarget::Fallback(handler))),
                None => Err(ApplicationError::MissingFallback),
            },
            Err(e) => Err(ApplicationError::Routing(e)),
        }
    }

    /// Clears the scope registry and flushes telemetry, the terminal
    /// step of `spec.md` §4.9's lifecycle.
    pub fn terminate(&mut self) {
        self.container.terminate();
        self.state = ApplicationState::Terminated;
    }
}
