use std::fmt;

/// Root error for the DI kernel, wrapping every sub-taxonomy from the
/// resolution pipeline, the scope registry, and the blueprint cache.
#[derive(Debug)]
pub enum ContainerError {
    /// No definition (explicit or autowired) exists for this service id.
    NotFound { id: String },
    /// The target class is abstract/interface-shaped or has no usable
    /// constructor path (no `Inspectable` impl and no bound factory).
    NotInstantiable { id: String },
    /// A union/intersection dependency resolved to more than one
    /// candidate and strict mode forbids a silent pick.
    AmbiguousType { id: String, candidates: Vec<String> },
    /// Namespace allowlist rejected this id in strict mode.
    NotAllowed { id: String },
    /// Resolution recursed past `max_resolution_depth`, or a cycle was
    /// detected within that bound.
    CyclicOrDeep { id: String, depth: usize },
    /// `set_scoped`/`end_scope` issued with no active scope frame.
    NoActiveScope,
    /// `end_scope` issued against an already-empty stack.
    ScopeUnderflow,
    /// Blueprint cache or analyzer failure, wrapped with context.
    Blueprint(BlueprintError),
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::NotFound { id } => {
                write!(f, "no service registered for '{id}'")
            }
            ContainerError::NotInstantiable { id } => {
                write!(f, "'{id}' is not instantiable: no blueprint and no bound factory")
            }
            ContainerError::AmbiguousType { id, candidates } => {
                write!(
                    f,
                    "'{id}' resolved to {} candidates in strict mode: {}",
                    candidates.len(),
                    candidates.join(", ")
                )
            }
            ContainerError::NotAllowed { id } => {
                write!(f, "'{id}' is outside the allowed namespaces")
            }
            ContainerError::CyclicOrDeep { id, depth } => {
                write!(f, "resolving '{id}' exceeded max depth ({depth}); likely a cycle")
            }
            ContainerError::NoActiveScope => write!(f, "no active scope to write into"),
            ContainerError::ScopeUnderflow => write!(f, "end_scope called with an empty stack"),
            ContainerError::Blueprint(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Blueprint(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BlueprintError> for ContainerError {
    fn from(e: BlueprintError) -> Self {
        ContainerError::Blueprint(e)
    }
}

/// Errors raised while analyzing or caching a service blueprint.
#[derive(Debug)]
pub enum BlueprintError {
    /// Target type declined to produce a prototype (abstract-shaped).
    NotInstantiable { type_name: &'static str },
    /// The cache held bytes that didn't deserialize into a prototype;
    /// callers treat this as a miss and re-analyze.
    Corrupted { key: String, reason: String },
    /// A write to the file backend failed; cache remains unchanged.
    WriteFailed { key: String, reason: String },
}

impl fmt::Display for BlueprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlueprintError::NotInstantiable { type_name } => {
                write!(f, "'{type_name}' has no blueprint (abstract or uninspectable)")
            }
            BlueprintError::Corrupted { key, reason } => {
                write!(f, "blueprint cache entry '{key}' is corrupted: {reason}")
            }
            BlueprintError::WriteFailed { key, reason } => {
                write!(f, "failed to persist blueprint '{key}': {reason}")
            }
        }
    }
}

impl std::error::Error for BlueprintError {}

/// Errors raised while loading or validating [`crate::config::ContainerConfig`].
#[derive(Debug)]
pub enum ConfigError {
    NotFound { key: String },
    TypeMismatch { key: String, expected: &'static str },
    Load { reason: String },
    Validation { reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { key } => write!(f, "config key '{key}' not found"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "config key '{key}' is not a valid {expected}")
            }
            ConfigError::Load { reason } => write!(f, "failed to load config: {reason}"),
            ConfigError::Validation { reason } => write!(f, "invalid config: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $target:ty as $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $target {
                fn from(err: $err_ty) -> Self {
                    <$target>::$variant(err.to_string())
                }
            }
        )*
    };
}
