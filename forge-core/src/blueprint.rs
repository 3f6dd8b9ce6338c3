use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;

use crate::definition::TypeRef;
use crate::error::{BlueprintError, ContainerError};
use crate::kernel::ResolutionContext;

/// One constructor parameter, injected property, or setter-method slot
/// in a [`ServicePrototype`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub service_id: String,
    pub default_value: Option<serde_json::Value>,
    pub optional: bool,
    pub variadic: bool,
}

pub type PropertySpec = ParamSpec;
pub type MethodSpec = ParamSpec;

/// The analyzer's output: a deterministic construction plan for one type.
///
/// `target_type` carries the type's display name only (not its `TypeId`,
/// which can't round-trip through a cache file) so the prototype is the
/// same byte-for-byte shape whether freshly analyzed or loaded from disk,
/// matching the contract in `spec.md` §6 ("byte-identical modulo
/// whitespace").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServicePrototype {
    pub target_type: String,
    pub ctor_params: Vec<ParamSpec>,
    pub injected_properties: Vec<PropertySpec>,
    pub injected_methods: Vec<MethodSpec>,
}

impl ServicePrototype {
    /// Cache key: the type's fully qualified name with path separators
    /// replaced by `_`, matching the teacher's filename derivation rule.
    pub fn cache_key(&self) -> String {
        self.target_type.replace("::", "_")
    }
}

/// Opt-in trait standing in for runtime reflection: a type that knows
/// its own construction plan without inspecting anything at runtime.
/// In a codegen-backed build this impl would be emitted by a derive
/// macro reading annotated struct fields; here it is written in the
/// same declarative shape that codegen would produce.
pub trait Inspectable: Send + Sync + 'static {
    fn type_ref() -> TypeRef
    where
        Self: Sized;

    /// Produce this type's blueprint. Types that are abstract-shaped
    /// (traits with no concrete construction path) should not implement
    /// this trait at all; the kernel falls back to an explicit factory
    /// or raises `NotInstantiable`.
    fn blueprint() -> ServicePrototype
    where
        Self: Sized;

    /// Construct `Self` by resolving every `ctor_param`/injected slot
    /// `blueprint()` names out of `ctx`, in declaration order. This is
    /// the "instantiate" half of the analyzer/constructor pair a derive
    /// macro would emit; hand-written here in the same declarative
    /// shape codegen would produce.
    fn build(ctx: &ResolutionContext) -> Result<Self, ContainerError>
    where
        Self: Sized;
}

/// Type-erased form of an [`Inspectable`] impl, stored wherever a
/// `Producer` or the kernel's autowiring table needs to call into a
/// concrete type's blueprint/build pair without naming that type.
/// `blueprint`/`build` are plain fn items (no captures), so they coerce
/// to fn pointers and stay `Copy`/cheap to clone.
#[derive(Clone)]
pub struct BlueprintProducer {
    pub type_ref: TypeRef,
    pub blueprint: fn() -> ServicePrototype,
    pub build: fn(&ResolutionContext) -> Result<Box<dyn Any + Send + Sync>, ContainerError>,
}

impl BlueprintProducer {
    pub fn of<T: Inspectable>() -> Self {
        Self {
            type_ref: T::type_ref(),
            blueprint: T::blueprint,
            build: |ctx| T::build(ctx).map(|v| Box::new(v) as Box<dyn Any + Send + Sync>),
        }
    }
}

impl std::fmt::Debug for BlueprintProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlueprintProducer({})", self.type_ref.1)
    }
}

/// Calls `T::blueprint()` and caches the result, matching the
/// "expensive reflection vs. cheap cache" rationale from `spec.md`
/// §4.1: in a codegen build the call itself is cheap, but a real
/// reflection-based implementation would make this cache load-bearing,
/// so the seam stays in place.
pub struct BlueprintAnalyzer {
    cache: HashMap<String, ServicePrototype>,
}

impl BlueprintAnalyzer {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    /// Analyze `T`, reusing an in-process memo if this analyzer has
    /// already produced `T`'s prototype. Does not consult the on-disk
    /// [`crate::cache`]-style backend; that's a concern of
    /// `forge-cache`, layered on top by the kernel.
    pub fn analyze<T: Inspectable>(&mut self) -> Result<ServicePrototype, BlueprintError> {
        Ok(self.analyze_dyn(T::type_ref(), T::blueprint))
    }

    /// Type-erased counterpart to [`Self::analyze`], used by the kernel
    /// when it only has a [`BlueprintProducer`] (no `T` in scope) to work
    /// from. On a cache hit this is a single `HashMap::get` — no call
    /// into `blueprint_fn` — so a resolution sequence that already has a
    /// type's prototype cached never re-runs its analysis.
    pub fn analyze_dyn(&mut self, type_ref: TypeRef, blueprint_fn: fn() -> ServicePrototype) -> ServicePrototype {
        let (_, name) = type_ref;
        if let Some(proto) = self.cache.get(name) {
            return proto.clone();
        }
        let proto = blueprint_fn();
        self.cache.insert(name.to_string(), proto.clone());
        proto
    }
}

impl Default for BlueprintAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;
    impl Inspectable for Leaf {
        fn type_ref() -> TypeRef {
            crate::definition::type_ref::<Leaf>()
        }
        fn blueprint() -> ServicePrototype {
            ServicePrototype {
                target_type: "forge_core::blueprint::tests::Leaf".into(),
                ctor_params: vec![],
                injected_properties: vec![],
                injected_methods: vec![],
            }
        }
        fn build(_ctx: &ResolutionContext) -> Result<Self, ContainerError> {
            Ok(Leaf)
        }
    }

    #[test]
    fn analyze_caches_by_type_name() {
        let mut analyzer = BlueprintAnalyzer::new();
        let first = analyzer.analyze::<Leaf>().unwrap();
        let second = analyzer.analyze::<Leaf>().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn blueprint_producer_builds_the_underlying_type() {
        let container = crate::kernel::Container::new(crate::config::ContainerConfig::builder().build());
        let ctx = container.root_context();
        let producer = BlueprintProducer::of::<Leaf>();
        let built = (producer.build)(&ctx).unwrap();
        assert!(built.downcast_ref::<Leaf>().is_some());
    }

    #[test]
    fn cache_key_replaces_separators() {
        let proto = Leaf::blueprint();
        assert_eq!(proto.cache_key(), "forge_core_blueprint_tests_Leaf");
    }
}
