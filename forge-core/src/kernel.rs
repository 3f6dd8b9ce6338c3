use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::blueprint::{BlueprintAnalyzer, BlueprintProducer, Inspectable};
use crate::config::ContainerConfig;
use crate::definition::{Lifetime, Producer, ServiceDefinition, ServiceId};
use crate::error::ContainerError;
use crate::scope::ScopeRegistry;
use crate::telemetry::{NullSink, TelemetryEvent, TelemetrySink};

type Instance = Arc<dyn Any + Send + Sync>;

/// Internal seam so [`ResolutionContext`] can recurse into the
/// container's resolution pipeline without the `Factory` type alias
/// needing a lifetime-parameterized trait object for `Container` itself.
trait DynResolver {
    fn resolve_dyn(&self, id: &ServiceId, depth: usize) -> Result<Instance, ContainerError>;
}

/// Handed to every [`crate::definition::Factory`] closure at call time:
/// the live view a factory needs to pull its own dependencies out of the
/// in-flight resolution, one recursive step deeper.
pub struct ResolutionContext<'a> {
    depth: usize,
    resolver: &'a dyn DynResolver,
}

impl<'a> ResolutionContext<'a> {
    pub fn resolve<T: Clone + Send + Sync + 'static>(
        &self,
        id: impl Into<ServiceId>,
    ) -> Result<T, ContainerError> {
        let id = id.into();
        let any = self.resolver.resolve_dyn(&id, self.depth)?;
        any.downcast_ref::<T>()
            .cloned()
            .ok_or(ContainerError::NotInstantiable { id: id.to_string() })
    }
}

/// The DI kernel: holds definitions, the scope registry, the blueprint
/// analyzer memo, and drives the 7-step resolution pipeline from
/// `spec.md` §4.4.
pub struct Container {
    definitions: HashMap<ServiceId, ServiceDefinition>,
    aliases: HashMap<ServiceId, ServiceId>,
    /// Non-strict-mode autowiring table (`spec.md` §4.4 step 3): classes
    /// discoverable by id without an explicit `ServiceDefinition`.
    autowired: HashMap<ServiceId, BlueprintProducer>,
    scope: Mutex<ScopeRegistry>,
    analyzer: Mutex<BlueprintAnalyzer>,
    config: ContainerConfig,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Container {
    pub fn new(config: ContainerConfig) -> Self {
        Self {
            definitions: HashMap::new(),
            aliases: HashMap::new(),
            autowired: HashMap::new(),
            scope: Mutex::new(ScopeRegistry::new()),
            analyzer: Mutex::new(BlueprintAnalyzer::new()),
            config,
            telemetry: Arc::new(NullSink),
        }
    }

    pub fn with_telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = sink;
        self
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn register(&mut self, def: ServiceDefinition) {
        for alias in &def.aliases {
            self.aliases.insert(alias.clone(), def.id.clone());
        }
        self.definitions.insert(def.id.clone(), def);
    }

    /// Makes `T` discoverable by `id` when strict mode is off and no
    /// explicit definition exists for it, per `spec.md` §4.4 step 3
    /// ("invariant: a definition is either registered explicitly or
    /// discovered lazily via autowiring when strict mode is off").
    /// Autowired instances are always `Transient` — there is no
    /// `ServiceDefinition` to carry a `Lifetime` for them.
    pub fn register_blueprint<T: Inspectable>(&mut self, id: impl Into<ServiceId>) {
        self.autowired.insert(id.into(), BlueprintProducer::of::<T>());
    }

    /// A depth-0 [`ResolutionContext`] for callers (tests, an
    /// `Inspectable::build` run in isolation) that need one without
    /// going through `resolve`.
    pub fn root_context(&self) -> ResolutionContext<'_> {
        ResolutionContext { depth: 0, resolver: self }
    }

    pub fn begin_scope(&self) {
        self.scope.lock().expect("scope lock poisoned").begin_scope();
    }

    pub fn end_scope(&self) -> Result<(), ContainerError> {
        self.scope.lock().expect("scope lock poisoned").end_scope()
    }

    pub fn terminate(&self) {
        self.scope.lock().expect("scope lock poisoned").terminate();
        self.telemetry.record(TelemetryEvent::Counter {
            metric: "container.terminate".into(),
            value: 1.0,
        });
    }

    pub fn resolve<T: Clone + Send + Sync + 'static>(
        &self,
        id: impl Into<ServiceId>,
    ) -> Result<T, ContainerError> {
        let id = id.into();
        let any = self.resolve_dyn(&id, 0)?;
        any.downcast_ref::<T>()
            .cloned()
            .ok_or(ContainerError::NotInstantiable { id: id.to_string() })
    }

    fn canonical_id<'a>(&'a self, id: &'a ServiceId) -> &'a ServiceId {
        self.aliases.get(id).unwrap_or(id)
    }

    /// Steps 1-7 from `spec.md` §4.4, short-circuiting on the first
    /// matching step.
    fn resolve_dyn_impl(&self, id: &ServiceId, depth: usize) -> Result<Instance, ContainerError> {
        let start = Instant::now();
        let id = self.canonical_id(id).clone();

        // 1. Guard: depth bound, namespace allowlist.
        if depth > self.config.max_resolution_depth {
            return Err(ContainerError::CyclicOrDeep { id: id.to_string(), depth });
        }
        if self.config.strict && !self.config.allowed_namespaces.is_empty() {
            let allowed = self
                .config
                .allowed_namespaces
                .iter()
                .any(|ns| id.as_str().starts_with(ns.as_str()));
            if !allowed {
                return Err(ContainerError::NotAllowed { id: id.to_string() });
            }
        }

        // 2. Scope lookup.
        if let Some(instance) = self.scope.lock().expect("scope lock poisoned").get(&id) {
            self.record_resolution(&id, start, "cached");
            return Ok(instance);
        }

        // 3. Definition lookup, falling back to non-strict autowiring.
        let lifetime: Lifetime;
        let instance: Instance;
        match self.definitions.get(&id) {
            Some(def) => {
                lifetime = def.lifetime;
                // 4 & 5. Blueprint load / instantiate, depending on the producer.
                instance = match &def.producer {
                    Producer::Instance(inst) => inst.clone(),
                    Producer::Factory(factory) => {
                        let ctx = ResolutionContext { depth: depth + 1, resolver: self };
                        let boxed = factory(&ctx)?;
                        Arc::from(boxed)
                    }
                    Producer::Blueprint(bp) => self.build_from_blueprint(bp, depth)?,
                };
            }
            None => {
                if self.config.strict {
                    return Err(ContainerError::NotFound { id: id.to_string() });
                }
                match self.autowired.get(&id) {
                    Some(bp) => {
                        lifetime = Lifetime::Transient;
                        instance = self.build_from_blueprint(bp, depth)?;
                    }
                    None => return Err(ContainerError::NotInstantiable { id: id.to_string() }),
                }
            }
        }

        // 6. Lifetime placement.
        match lifetime {
            Lifetime::Singleton => {
                self.scope.lock().expect("scope lock poisoned").add_singleton(id.clone(), instance.clone());
            }
            Lifetime::Scoped => {
                let mut scope = self.scope.lock().expect("scope lock poisoned");
                if scope.is_scoped() {
                    scope.set_scoped(id.clone(), instance.clone())?;
                } else if !self.config.strict {
                    scope.add_singleton(id.clone(), instance.clone());
                } else {
                    return Err(ContainerError::NoActiveScope);
                }
            }
            Lifetime::Transient => {}
        }

        // 7. Telemetry.
        self.record_resolution(&id, start, "constructed");
        Ok(instance)
    }

    /// Consults the analyzer's memo for `bp`'s prototype (a cache hit is
    /// a single lookup, never a call into `bp.blueprint`), then runs
    /// `bp.build` to recursively resolve every ctor param out of this
    /// container one depth deeper.
    fn build_from_blueprint(&self, bp: &BlueprintProducer, depth: usize) -> Result<Instance, ContainerError> {
        self.analyzer.lock().expect("analyzer lock poisoned").analyze_dyn(bp.type_ref, bp.blueprint);
        let ctx = ResolutionContext { depth: depth + 1, resolver: self };
        let boxed = (bp.build)(&ctx)?;
        Ok(Arc::from(boxed))
    }

    fn record_resolution(&self, id: &ServiceId, start: Instant, strategy: &str) {
        if !self.config.telemetry_enabled {
            return;
        }
        self.telemetry.record(TelemetryEvent::Resolution {
            service_id: id.to_string(),
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            strategy: strategy.to_string(),
        });
    }
}

impl DynResolver for Container {
    fn resolve_dyn(&self, id: &ServiceId, depth: usize) -> Result<Instance, ContainerError> {
        self.resolve_dyn_impl(id, depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::Factory;

    fn container(strict: bool, max_depth: usize) -> Container {
        let cfg = ContainerConfig::builder()
            .strict(strict)
            .telemetry_enabled(true)
            .max_resolution_depth(max_depth)
            .build();
        Container::new(cfg)
    }

    #[test]
    fn resolves_provided_instance() {
        let mut c = container(true, 16);
        c.register(ServiceDefinition::new(
            "config",
            Lifetime::Singleton,
            Producer::Instance(Arc::new(42i32)),
        ));
        let v: i32 = c.resolve("config").unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn singleton_is_reused_across_resolutions() {
        let mut c = container(true, 16);
        let factory: Factory = Arc::new(|_ctx| Ok(Box::new(String::from("built")) as Box<dyn Any + Send + Sync>));
        c.register(ServiceDefinition::new("svc", Lifetime::Singleton, Producer::Factory(factory)));
        let a: String = c.resolve("svc").unwrap();
        let b: String = c.resolve("svc").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn scoped_reuse_within_one_scope_then_distinct_after() {
        let mut c = container(false, 16);
        let factory: Factory = Arc::new(|_ctx| Ok(Box::new(uuid_stub()) as Box<dyn Any + Send + Sync>));
        c.register(ServiceDefinition::new("req", Lifetime::Scoped, Producer::Factory(factory)));

        c.begin_scope();
        let a: u64 = c.resolve("req").unwrap();
        let b: u64 = c.resolve("req").unwrap();
        assert_eq!(a, b);
        c.end_scope().unwrap();

        c.begin_scope();
        let d: u64 = c.resolve("req").unwrap();
        c.end_scope().unwrap();
        assert_ne!(a, d);
    }

    // deterministic stand-in for a random id, bumped on each call
    fn uuid_stub() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }

    #[test]
    fn cyclic_dependency_fails_at_depth_bound() {
        let mut c = container(true, 4);
        let factory_a: Factory = Arc::new(|ctx| {
            let _: i32 = ctx.resolve("b")?;
            Ok(Box::new(1i32) as Box<dyn Any + Send + Sync>)
        });
        let factory_b: Factory = Arc::new(|ctx| {
            let _: i32 = ctx.resolve("a")?;
            Ok(Box::new(2i32) as Box<dyn Any + Send + Sync>)
        });
        c.register(ServiceDefinition::new("a", Lifetime::Transient, Producer::Factory(factory_a)));
        c.register(ServiceDefinition::new("b", Lifetime::Transient, Producer::Factory(factory_b)));

        let err = c.resolve::<i32>("a").unwrap_err();
        assert!(matches!(err, ContainerError::CyclicOrDeep { .. }));
    }

    #[test]
    fn not_found_in_strict_mode() {
        let c = container(true, 16);
        let err = c.resolve::<i32>("missing").unwrap_err();
        assert!(matches!(err, ContainerError::NotFound { .. }));
    }

    #[test]
    fn scoped_without_active_scope_in_strict_mode_fails() {
        let mut c = container(true, 16);
        let factory: Factory = Arc::new(|_ctx| Ok(Box::new(1i32) as Box<dyn Any + Send + Sync>));
        c.register(ServiceDefinition::new("req", Lifetime::Scoped, Producer::Factory(factory)));
        let err = c.resolve::<i32>("req").unwrap_err();
        assert!(matches!(err, ContainerError::NoActiveScope));
    }

    use crate::blueprint::{ParamSpec, ServicePrototype};
    use crate::definition::TypeRef;

    #[derive(Clone, Debug)]
    struct Greeter {
        prefix: String,
    }

    impl crate::blueprint::Inspectable for Greeter {
        fn type_ref() -> TypeRef {
            crate::definition::type_ref::<Greeter>()
        }
        fn blueprint() -> ServicePrototype {
            ServicePrototype {
                target_type: "forge_core::kernel::tests::Greeter".into(),
                ctor_params: vec![ParamSpec {
                    name: "prefix".into(),
                    service_id: "prefix".into(),
                    default_value: None,
                    optional: false,
                    variadic: false,
                }],
                injected_properties: vec![],
                injected_methods: vec![],
            }
        }
        fn build(ctx: &ResolutionContext) -> Result<Self, ContainerError> {
            Ok(Greeter { prefix: ctx.resolve("prefix")? })
        }
    }

    #[test]
    fn explicit_blueprint_producer_recursively_resolves_ctor_params() {
        let mut c = container(true, 16);
        c.register(ServiceDefinition::new(
            "prefix",
            Lifetime::Singleton,
            Producer::Instance(Arc::new(String::from("hi"))),
        ));
        c.register(ServiceDefinition::new("greeter", Lifetime::Transient, Producer::blueprint_of::<Greeter>()));

        let greeter: Greeter = c.resolve("greeter").unwrap();
        assert_eq!(greeter.prefix, "hi");
    }

    #[test]
    fn non_strict_autowiring_synthesizes_an_unregistered_definition() {
        let mut c = container(false, 16);
        c.register(ServiceDefinition::new(
            "prefix",
            Lifetime::Singleton,
            Producer::Instance(Arc::new(String::from("auto"))),
        ));
        c.register_blueprint::<Greeter>("greeter");

        // No explicit ServiceDefinition for "greeter" exists; strict mode
        // would fail NotFound, non-strict synthesizes it from the
        // autowiring table.
        let greeter: Greeter = c.resolve("greeter").unwrap();
        assert_eq!(greeter.prefix, "auto");
    }

    #[test]
    fn strict_mode_never_consults_the_autowiring_table() {
        let mut c = container(true, 16);
        c.register_blueprint::<Greeter>("greeter");
        let err = c.resolve::<Greeter>("greeter").unwrap_err();
        assert!(matches!(err, ContainerError::NotFound { .. }));
    }

    #[test]
    fn alias_resolves_to_canonical_definition() {
        let mut c = container(true, 16);
        c.register(
            ServiceDefinition::new("primary", Lifetime::Singleton, Producer::Instance(Arc::new(9i32)))
                .with_alias("alt"),
        );
        let v: i32 = c.resolve("alt").unwrap();
        assert_eq!(v, 9);
    }
}
