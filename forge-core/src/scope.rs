use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::definition::ServiceId;
use crate::error::ContainerError;

type Instance = Arc<dyn Any + Send + Sync>;

/// Stack of scoped instance maps plus a singleton map, exactly the
/// shape `spec.md` §3 describes for `ScopeStack`.
///
/// Deliberately **not** `Send`/`Sync`-shared across requests: one
/// instance lives per in-flight request and is never wrapped in an
/// `Arc`/`Mutex`, matching the "per-request local, never shared across
/// workers" invariant from `spec.md` §5. The container's singleton map
/// is the only piece of shared, lock-guarded state; it lives here too
/// because `spec.md` ties singleton storage to the same registry as
/// scoped storage ("addSingleton bypasses stack").
pub struct ScopeRegistry {
    stack: Vec<HashMap<ServiceId, Instance>>,
    singletons: RwLock<HashMap<ServiceId, Instance>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            singletons: RwLock::new(HashMap::new()),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_scoped(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Push a new scope frame.
    pub fn begin_scope(&mut self) {
        self.stack.push(HashMap::new());
    }

    /// Pop the top scope frame. Fails if the stack is already empty.
    pub fn end_scope(&mut self) -> Result<(), ContainerError> {
        if self.stack.pop().is_none() {
            return Err(ContainerError::ScopeUnderflow);
        }
        Ok(())
    }

    /// Write to the top scope frame if one is active, else to the
    /// singleton map (mirroring `spec.md`'s "configurable via explicit
    /// addSingleton" — here the fallback is automatic since the caller
    /// had no scope to target).
    pub fn set(&mut self, id: ServiceId, value: Instance) {
        if let Some(top) = self.stack.last_mut() {
            top.insert(id, value);
        } else {
            self.singletons.write().expect("singleton lock poisoned").insert(id, value);
        }
    }

    /// Write to the top scope frame. Fails if no scope is active.
    pub fn set_scoped(&mut self, id: ServiceId, value: Instance) -> Result<(), ContainerError> {
        match self.stack.last_mut() {
            Some(top) => {
                top.insert(id, value);
                Ok(())
            }
            None => Err(ContainerError::NoActiveScope),
        }
    }

    /// Write to the singleton map directly, bypassing the scope stack.
    pub fn add_singleton(&self, id: ServiceId, value: Instance) {
        self.singletons.write().expect("singleton lock poisoned").insert(id, value);
    }

    /// Look up by id: top-of-stack first, singleton map second.
    pub fn get(&self, id: &ServiceId) -> Option<Instance> {
        if let Some(top) = self.stack.last() {
            if let Some(v) = top.get(id) {
                return Some(v.clone());
            }
        }
        self.singletons.read().expect("singleton lock poisoned").get(id).cloned()
    }

    /// Reset to the idle state, clearing both layers.
    pub fn terminate(&mut self) {
        self.stack.clear();
        self.singletons.write().expect("singleton lock poisoned").clear();
    }
}

impl Default for ScopeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
