use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::kernel::ResolutionContext;
use crate::ContainerError;

/// Logical name under which a service is registered and retrieved.
///
/// Backed by `Arc<str>` so clones are cheap and the id can be used as a
/// `HashMap` key without re-allocating on every lookup, mirroring the
/// teacher's preference for cheap-to-clone identifiers threaded through
/// hot paths (`r2e_core::beans` keys everything off `TypeId` for the
/// same reason; here the id is a user-chosen string instead of a type).
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({})", self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        ServiceId::new(s)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        ServiceId::new(s)
    }
}

/// The idiomatic stand-in for "a reflectable class reference": a type's
/// identity plus its human-readable name, matching the teacher's
/// `Bean::dependencies() -> Vec<(TypeId, &'static str)>` convention.
pub type TypeRef = (TypeId, &'static str);

pub fn type_ref<T: 'static>() -> TypeRef {
    (TypeId::of::<T>(), std::any::type_name::<T>())
}

/// How long a resolved instance lives once constructed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Lifetime {
    /// A fresh instance every resolution; never stored.
    Transient,
    /// One instance per active scope frame.
    Scoped,
    /// One instance for the lifetime of the container.
    Singleton,
}

/// What a [`ServiceDefinition`] uses to produce an instance.
pub enum Producer {
    /// Resolve via the type's `Inspectable` blueprint: analyze (memoized)
    /// then recursively construct every ctor param out of the container.
    Blueprint(crate::blueprint::BlueprintProducer),
    /// An explicit factory closure: `Context -> instance`.
    Factory(Factory),
    /// A pre-built instance, stored directly (an "instance pointer").
    Instance(Arc<dyn Any + Send + Sync>),
}

impl Producer {
    /// Build a `Blueprint` producer from a concrete `Inspectable` type,
    /// without naming that type again at every call site.
    pub fn blueprint_of<T: crate::blueprint::Inspectable>() -> Self {
        Producer::Blueprint(crate::blueprint::BlueprintProducer::of::<T>())
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::Blueprint(bp) => write!(f, "Producer::Blueprint({})", bp.type_ref.1),
            Producer::Factory(_) => write!(f, "Producer::Factory(..)"),
            Producer::Instance(_) => write!(f, "Producer::Instance(..)"),
        }
    }
}

/// Boxed factory closure taking the in-flight resolution context and
/// producing a type-erased instance, or a [`ContainerError`] on failure.
pub type Factory = Arc<
    dyn Fn(&ResolutionContext) -> Result<Box<dyn Any + Send + Sync>, ContainerError>
        + Send
        + Sync,
>;

/// Registered shape of a service: how it is produced, how long it lives,
/// and what names it answers to.
pub struct ServiceDefinition {
    pub id: ServiceId,
    pub lifetime: Lifetime,
    pub producer: Producer,
    pub aliases: BTreeSet<ServiceId>,
    pub tags: BTreeSet<String>,
}

impl ServiceDefinition {
    pub fn new(id: impl Into<ServiceId>, lifetime: Lifetime, producer: Producer) -> Self {
        Self {
            id: id.into(),
            lifetime,
            producer,
            aliases: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<ServiceId>) -> Self {
        self.aliases.insert(alias.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("id", &self.id)
            .field("lifetime", &self.lifetime)
            .field("producer", &self.producer)
            .field("aliases", &self.aliases)
            .field("tags", &self.tags)
            .finish()
    }
}
