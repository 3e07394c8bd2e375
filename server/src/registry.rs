//! Process-wide table of objects callable from remote peers.
//!
//! DESIGN
//! ======
//! `Registry` is a cheap-to-clone handle over `Arc<RwLock<HashMap<..>>>`,
//! injected into every session through Axum's `State` extractor and written
//! by application code on arbitrary threads. Lookups clone the `Arc` out of
//! the map so the lock is never held while a target method runs.
//!
//! An identifier binds at most one object; re-registering fails rather than
//! overwriting. One instance may sit under several identifiers, and
//! unregistering by instance removes all of them.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::object::RemoteObject;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("identifier `{0}` is already registered")]
    DuplicateIdentifier(String),
    #[error("identifier `{0}` is not registered")]
    NotFound(String),
}

// =============================================================================
// REGISTRY
// =============================================================================

type ObjectMap = HashMap<String, Arc<RemoteObject>>;

#[derive(Clone, Default)]
pub struct Registry {
    objects: Arc<RwLock<ObjectMap>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `identifier` to `object`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateIdentifier`] if the identifier is
    /// already bound. The existing binding is left untouched.
    pub fn register(
        &self,
        identifier: impl Into<String>,
        object: impl Into<Arc<RemoteObject>>,
    ) -> Result<(), RegistryError> {
        let mut objects = self.write();
        match objects.entry(identifier.into()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateIdentifier(entry.key().clone())),
            Entry::Vacant(entry) => {
                let object = object.into();
                debug!(
                    identifier = %entry.key(),
                    type_name = object.type_name(),
                    methods = ?object.method_names(),
                    "registry: registered"
                );
                entry.insert(object);
                Ok(())
            }
        }
    }

    /// Remove every identifier bound to `instance`. Returns how many were removed.
    pub fn unregister<T: ?Sized>(&self, instance: &Arc<T>) -> usize {
        let mut objects = self.write();
        let before = objects.len();
        objects.retain(|identifier, object| {
            let keep = !object.is_instance(instance);
            if !keep {
                debug!(%identifier, "registry: unregistered");
            }
            keep
        });
        before - objects.len()
    }

    /// Look up the object bound to `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if nothing is bound.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<RemoteObject>, RegistryError> {
        self.read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(identifier.to_owned()))
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.read().contains_key(identifier)
    }

    /// Bound identifiers, sorted.
    #[must_use]
    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.read().keys().cloned().collect();
        identifiers.sort_unstable();
        identifiers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectMap> {
        self.objects.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ObjectMap> {
        self.objects.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
