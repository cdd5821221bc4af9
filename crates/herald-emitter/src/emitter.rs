//! Name-keyed listener registry and dispatcher.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::{self, BoxFuture, FutureExt};
use tracing::{trace, warn};

use crate::error::{EmitError, ListenerError, ListenerFailure, ListenerPanicked, ListenerResult};

type ListenerFn<P> = dyn Fn(P) -> BoxFuture<'static, ListenerResult> + Send + Sync;

/// A registered callback.
///
/// Clones share identity: [`TypedEventEmitter::off`] removes a registration
/// when it was made with the same `Listener` or a clone of it.
pub struct Listener<P> {
    inner: Arc<ListenerFn<P>>,
}

impl<P: 'static> Listener<P> {
    /// Wraps an asynchronous callback.
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |payload| callback(payload).boxed()),
        }
    }

    /// Wraps a synchronous callback. Its body runs when the listener is
    /// invoked, before any asynchronous listener is polled to completion.
    pub fn sync<F>(callback: F) -> Self
    where
        F: Fn(P) -> ListenerResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(move |payload| future::ready(callback(payload)).boxed()),
        }
    }
}

impl<P> Listener<P> {
    /// Returns whether `self` and `other` are the same listener.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn invoke(&self, payload: P) -> BoxFuture<'static, ListenerResult> {
        (self.inner)(payload)
    }
}

impl<P> Clone for Listener<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P> fmt::Debug for Listener<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Listener")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

struct Registration<P> {
    listener: Listener<P>,
    once: bool,
}

type ListenerMap<P> = HashMap<String, Vec<Registration<P>>>;

/// Publish/subscribe dispatcher keyed by event name.
///
/// Listeners for a name are kept in registration order; the same listener
/// may be registered several times and then runs once per registration.
/// The listener map is guarded by a lock that is never held while a
/// listener runs, so listeners may register or remove listeners freely.
pub struct TypedEventEmitter<P> {
    listeners: RwLock<ListenerMap<P>>,
}

impl<P> Default for TypedEventEmitter<P> {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }
}

impl<P: Clone + Send + 'static> TypedEventEmitter<P> {
    /// Creates an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` to the listeners for `name`.
    pub fn on(&self, name: impl Into<String>, listener: Listener<P>) {
        self.insert(name.into(), listener, false);
    }

    /// Appends `listener` for the next emission of `name` only.
    pub fn once(&self, name: impl Into<String>, listener: Listener<P>) {
        self.insert(name.into(), listener, true);
    }

    /// Removes the first registration of `listener` for `name`. Returns
    /// whether a registration was removed.
    ///
    /// When the last listener for `name` goes, the name is dropped from
    /// [`TypedEventEmitter::event_names`].
    pub fn off(&self, name: &str, listener: &Listener<P>) -> bool {
        let mut map = self.write();
        let Some(registrations) = map.get_mut(name) else {
            return false;
        };
        let Some(position) = registrations
            .iter()
            .position(|r| r.listener.ptr_eq(listener))
        else {
            return false;
        };
        registrations.remove(position);
        if registrations.is_empty() {
            map.remove(name);
        }
        true
    }

    /// Invokes every listener registered for `name` with a clone of
    /// `payload` and waits until all of them have finished.
    ///
    /// Listeners are invoked in registration order; their futures are then
    /// driven concurrently. Listeners registered while the emission is in
    /// flight are not part of it. Returns the number of listeners invoked.
    ///
    /// # Errors
    ///
    /// Returns `EmitError` if any listener failed or panicked. The remaining
    /// listeners still run to completion.
    pub async fn emit(&self, name: &str, payload: P) -> Result<usize, EmitError> {
        let Some(listeners) = self.snapshot(name) else {
            return Ok(0);
        };

        let mut pending: Vec<BoxFuture<'static, ListenerResult>> =
            Vec::with_capacity(listeners.len());
        for listener in &listeners {
            let invoked = panic::catch_unwind(AssertUnwindSafe(|| listener.invoke(payload.clone())));
            pending.push(match invoked {
                Ok(running) => async move {
                    AssertUnwindSafe(running)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| Err(panic_error(panic)))
                }
                .boxed(),
                Err(panic) => future::ready(Err(panic_error(panic))).boxed(),
            });
        }
        drop(payload);

        let outcomes = future::join_all(pending).await;
        let invoked = outcomes.len();
        let failures: Vec<ListenerFailure> = outcomes
            .into_iter()
            .enumerate()
            .filter_map(|(index, outcome)| {
                outcome.err().map(|error| {
                    warn!(event = %name, index, error = %error, "event listener failed");
                    ListenerFailure {
                        event: name.to_owned(),
                        index,
                        error,
                    }
                })
            })
            .collect();

        trace!(event = %name, invoked, failed = failures.len(), "emission settled");
        EmitError::from_failures(name, failures).map_or(Ok(invoked), Err)
    }

    /// Number of listeners currently registered for `name`.
    #[must_use]
    pub fn listener_count(&self, name: &str) -> usize {
        self.read().get(name).map_or(0, Vec::len)
    }

    /// Returns whether `name` has at least one listener.
    #[must_use]
    pub fn has_listeners(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Sorted snapshot of every name with at least one listener.
    #[must_use]
    pub fn event_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Removes the listeners for `name`, or for every name when `None`.
    pub fn remove_all_listeners(&self, name: Option<&str>) {
        let mut map = self.write();
        match name {
            Some(name) => {
                map.remove(name);
            }
            None => map.clear(),
        }
    }

    fn insert(&self, name: String, listener: Listener<P>, once: bool) {
        self.write()
            .entry(name)
            .or_default()
            .push(Registration { listener, once });
    }

    /// Clones the listeners for `name`, consuming any `once` registrations.
    fn snapshot(&self, name: &str) -> Option<Vec<Listener<P>>> {
        {
            let map = self.read();
            let registrations = map.get(name)?;
            if !registrations.iter().any(|r| r.once) {
                return Some(registrations.iter().map(|r| r.listener.clone()).collect());
            }
        }

        let mut map = self.write();
        let registrations = map.get_mut(name)?;
        let listeners = registrations.iter().map(|r| r.listener.clone()).collect();
        registrations.retain(|r| !r.once);
        if registrations.is_empty() {
            map.remove(name);
        }
        Some(listeners)
    }

    fn read(&self) -> RwLockReadGuard<'_, ListenerMap<P>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListenerMap<P>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> fmt::Debug for TypedEventEmitter<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        let mut counts: Vec<(&str, usize)> =
            map.iter().map(|(name, l)| (name.as_str(), l.len())).collect();
        counts.sort_unstable();
        f.debug_struct("TypedEventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}

fn panic_error(panic: Box<dyn Any + Send>) -> ListenerError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned());
    Box::new(ListenerPanicked { message })
}
