use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::{batch_function::BatchFunction, error::LoadResult, loader::Loader};

/// Binds loader instances to the lifetime of one incoming request.
///
/// The request-handling layer creates a `RequestScope` at ingress, hands it (by reference or
/// `Arc`) to every downstream resolution step, and discards it when the request completes.
/// Batch functions are bound up front with [`RequestScope::register`]; the loader instance for
/// an entity type is created lazily on first use and shared by all concurrent callers within
/// the request, which is what lets their keys coalesce into one batch. Nothing in the scope
/// survives the request: dropping it (or calling [`RequestScope::complete`]) tears down every
/// worker, and unresolved loads observe [`LoadError::Cancelled`](crate::LoadError::Cancelled).
///
/// Using the scope without a registration, or after it has completed, is a programming error
/// and panics rather than silently creating an unscoped loader.
pub struct RequestScope {
    state: Mutex<ScopeState>,
}

struct ScopeState {
    slots: HashMap<TypeId, Slot>,
    completed: bool,
}

enum Slot {
    /// Batch function registered, loader not yet demanded.
    Registered(Box<dyn Any + Send>),
    /// Live loader, plus the erased handle that tears its worker down.
    Active { loader: Arc<dyn Any + Send + Sync>, shutdown: Box<dyn Fn() + Send> },
}

struct Registration<F: BatchFunction>(F::Context);

impl RequestScope {
    pub fn new() -> Self {
        Self { state: Mutex::new(ScopeState { slots: HashMap::new(), completed: false }) }
    }

    /// Binds `F`'s batch function (via its context) to this scope.
    ///
    /// The loader itself is not created until the first [`RequestScope::loader`] or
    /// [`RequestScope::load`] call for `F`.
    ///
    /// # Panics
    ///
    /// Panics if `F` is already registered, or if the scope has completed.
    pub fn register<F: BatchFunction>(&self, context: F::Context) {
        let mut state = self.lock_state();
        if state.completed {
            panic!("request scope has completed; nothing further may be registered");
        }
        if state.slots.contains_key(&TypeId::of::<F>()) {
            panic!("a batch function is already registered for {}", type_name::<F>());
        }
        state.slots.insert(TypeId::of::<F>(), Slot::Registered(Box::new(Registration::<F>(context))));
    }

    /// Returns the loader instance for `F`, creating it on first use.
    ///
    /// Every caller within the request receives the same instance, never a copy.
    ///
    /// # Panics
    ///
    /// Panics if no batch function was registered for `F`, or if the scope has completed.
    pub fn loader<F: BatchFunction>(&self) -> Arc<Loader<F>> {
        let mut state = self.lock_state();
        if state.completed {
            panic!("request scope has completed; loaders must not be used after their request ends");
        }
        match state.slots.remove(&TypeId::of::<F>()) {
            None => panic!(
                "no batch function registered for {}; call RequestScope::register before loading",
                type_name::<F>()
            ),
            Some(Slot::Active { loader, shutdown }) => {
                let typed = loader.clone().downcast::<Loader<F>>().unwrap_or_else(|_| {
                    panic!("loader slot for {} holds another entity type", type_name::<F>())
                });
                state.slots.insert(TypeId::of::<F>(), Slot::Active { loader, shutdown });
                typed
            }
            Some(Slot::Registered(registration)) => {
                let registration =
                    registration.downcast::<Registration<F>>().unwrap_or_else(|_| {
                        panic!("registration slot for {} holds another entity type", type_name::<F>())
                    });
                let loader = Arc::new(Loader::<F>::new(registration.0));
                let erased: Arc<dyn Any + Send + Sync> = loader.clone();
                let for_shutdown = loader.clone();
                state.slots.insert(
                    TypeId::of::<F>(),
                    Slot::Active {
                        loader: erased,
                        shutdown: Box::new(move || for_shutdown.shutdown()),
                    },
                );
                loader
            }
        }
    }

    /// Loads one value through `F`'s loader for this request.
    pub async fn load<F: BatchFunction>(&self, key: F::Key) -> LoadResult<F::Value> {
        self.loader::<F>().load(key).await
    }

    /// Loads many values through `F`'s loader, one outcome per key in argument order.
    pub async fn load_many<F: BatchFunction>(&self, keys: Vec<F::Key>) -> Vec<LoadResult<F::Value>> {
        self.loader::<F>().load_many(keys).await
    }

    /// Ends the scope: every loader worker is torn down and unresolved loads observe
    /// [`LoadError::Cancelled`](crate::LoadError::Cancelled). Called automatically on drop.
    pub fn complete(&self) {
        let mut state = self.lock_state();
        state.completed = true;
        for (_, slot) in state.slots.drain() {
            if let Slot::Active { shutdown, .. } = slot {
                shutdown();
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScopeState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.complete();
    }
}
