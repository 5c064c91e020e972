//! Named store bindings with test-time substitution.
//!
//! A [`Registry`] maps a symbolic name (usually [`DEFAULT_STORE`]) to a lazy
//! factory. The factory runs on first resolution and its store is memoized.
//! A stub temporarily shadows the factory binding; [`StubGuard`] removes the
//! stub when it goes out of scope, so the binding is restored on every exit
//! path including panics.
//!
//! The registry is a plain value handed to whoever needs it. Two registries
//! never share state, which keeps tests isolated from each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;
use tracing::debug;

use crate::{CoreError, SharedStore, StoreError};

/// Name under which operations look up their primary store.
pub const DEFAULT_STORE: &str = "db";

type Factory = Box<dyn Fn() -> Result<SharedStore, StoreError> + Send + Sync>;

struct Binding {
    factory: Factory,
    instance: OnceCell<SharedStore>,
}

impl Binding {
    fn instance(&self) -> Result<SharedStore, StoreError> {
        self.instance.get_or_try_init(|| (self.factory)()).cloned()
    }
}

#[derive(Default)]
pub struct Registry {
    bindings: Mutex<HashMap<String, Arc<Binding>>>,
    stubs: Mutex<HashMap<String, SharedStore>>,
}

// Each critical section is a single map operation, so a poisoned lock never
// guards a half-applied change.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a factory. Nothing is constructed until the first
    /// [`resolve`](Self::resolve). Registering an existing name replaces the
    /// factory and forgets the store it had built.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<SharedStore, StoreError> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(binding = %name, "registering store factory");
        let binding = Binding {
            factory: Box::new(factory),
            instance: OnceCell::new(),
        };
        lock(&self.bindings).insert(name, Arc::new(binding));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        lock(&self.bindings).contains_key(name)
    }

    pub fn is_stubbed(&self, name: &str) -> bool {
        lock(&self.stubs).contains_key(name)
    }

    /// Return the store currently bound to `name`: the active stub if there
    /// is one, otherwise the (lazily built) factory store.
    pub fn resolve(&self, name: &str) -> Result<SharedStore, CoreError> {
        if let Some(stub) = lock(&self.stubs).get(name) {
            return Ok(Arc::clone(stub));
        }
        // Clone the binding out so the factory runs without holding the map lock.
        let binding = lock(&self.bindings)
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::Unbound(name.to_string()))?;
        Ok(binding.instance()?)
    }

    /// Shadow the binding for `name` with `instance` until the returned guard
    /// is dropped. Replaces any stub already active for `name`.
    pub fn stub(&self, name: &str, instance: SharedStore) -> Result<StubGuard<'_>, CoreError> {
        if !self.is_registered(name) {
            return Err(CoreError::Unbound(name.to_string()));
        }
        debug!(binding = %name, "stubbing store");
        lock(&self.stubs).insert(name.to_string(), instance);
        Ok(StubGuard {
            registry: self,
            name: name.to_string(),
        })
    }

    /// Drop the stub for `name`, reverting to the factory binding.
    /// No-op when no stub is active.
    pub fn unstub(&self, name: &str) {
        if lock(&self.stubs).remove(name).is_some() {
            debug!(binding = %name, "stub removed");
        }
    }

    /// Run `f` with `instance` stubbed in for `name`. The stub is removed
    /// when `f` returns or unwinds.
    pub fn with_stub<R, F>(&self, name: &str, instance: SharedStore, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&SharedStore) -> R,
    {
        let _guard = self.stub(name, Arc::clone(&instance))?;
        Ok(f(&instance))
    }
}

/// Scope of an active stub; unstubs on drop.
#[must_use = "the stub is removed as soon as the guard is dropped"]
pub struct StubGuard<'a> {
    registry: &'a Registry,
    name: String,
}

impl Drop for StubGuard<'_> {
    fn drop(&mut self) {
        self.registry.unstub(&self.name);
    }
}
