use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use sentry::{Hub, SentryFutureExt};
use tokio::runtime::Handle;

use crate::error::{CacheError, CacheResult};
use crate::namespace::Namespace;

type ComputationChannel<T> = Shared<oneshot::Receiver<CacheResult<T>>>;

/// Per-call options for [`NamespaceCache::get`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Ignore the stored entry and any running computation, and compute a fresh value for this
    /// call only.
    ///
    /// A bypassing computation is never shared with other callers and its result is never
    /// stored, so concurrent non-bypassing callers are unaffected by it.
    pub bypass: bool,
}

impl GetOptions {
    /// Options that force a fresh computation.
    pub fn bypass() -> Self {
        Self { bypass: true }
    }
}

/// A computation that is currently running for a namespace.
struct InFlight<T> {
    /// Unique among all computations ever registered on this cache.
    id: u64,
    channel: ComputationChannel<T>,
}

struct CacheState<T> {
    entries: BTreeMap<Namespace, T>,
    computations: BTreeMap<Namespace, InFlight<T>>,
    next_id: u64,
}

impl<T> CacheState<T> {
    /// Removes the computation for `namespace`, but only if it is the one identified by `id`.
    fn remove_computation(&mut self, namespace: &Namespace, id: u64) -> bool {
        match self.computations.get(namespace) {
            Some(in_flight) if in_flight.id == id => {
                self.computations.remove(namespace);
                true
            }
            _ => false,
        }
    }
}

/// An in-memory cache of asynchronously computed values, keyed by [`Namespace`].
///
/// The purpose of this cache is request coalescing: concurrent lookups of the same namespace
/// share a single computation and all receive its result. A successful result is kept until it is
/// explicitly [cleared](Self::clear); there is no eviction. Failures are handed to every waiter
/// of the computation but are never stored, so the next lookup starts over.
///
/// Cloning the cache yields another handle to the same entries.
pub struct NamespaceCache<T> {
    /// Used to name metrics and logs.
    name: Arc<str>,
    state: Arc<Mutex<CacheState<T>>>,
}

impl<T> Clone for NamespaceCache<T> {
    fn clone(&self) -> Self {
        // https://github.com/rust-lang/rust/issues/26925
        Self {
            name: Arc::clone(&self.name),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for NamespaceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (entries, computations) = self
            .state
            .try_lock()
            .map(|state| (state.entries.len(), state.computations.len()))
            .unwrap_or_default();
        f.debug_struct("NamespaceCache")
            .field("name", &self.name)
            .field("entries", &entries)
            .field("computations", &computations)
            .finish()
    }
}

impl<T> Default for NamespaceCache<T> {
    fn default() -> Self {
        Self::new("default")
    }
}

impl<T> NamespaceCache<T> {
    /// Creates an empty cache. The `name` is used to tag metrics.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(CacheState {
                entries: BTreeMap::new(),
                computations: BTreeMap::new(),
                next_id: 0,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Removes the stored entry for `namespace`, or all entries when `namespace` is `None`.
    ///
    /// Running computations are not affected. They will still store their result once they
    /// succeed. Clearing a namespace that has no entry does nothing.
    pub fn clear(&self, namespace: Option<&str>) {
        let entries = {
            let mut state = self.state.lock();
            match namespace {
                Some(namespace) => {
                    state.entries.remove(namespace);
                }
                None => state.entries.clear(),
            }
            state.entries.len()
        };

        let name = &self.name;
        tracing::debug!(cache = %name, namespace, "Cleared cache entries");
        metric!(gauge(&format!("caches.{name}.memory.entries")) = entries as u64);
    }
}

impl<T> NamespaceCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Returns the value for `namespace`, computing it with `compute` if necessary.
    ///
    /// - A stored entry is returned right away, without calling `compute`.
    /// - If another call is already computing this namespace, this call waits for that
    ///   computation instead, and `compute` is dropped unused.
    /// - Otherwise `compute` is spawned and registered as the computation for this namespace.
    ///   Once it succeeds its value is stored.
    ///
    /// With [`GetOptions::bypass`], `compute` is always spawned, and neither reads nor writes
    /// the shared state.
    ///
    /// NOTE: This function itself is *not* `async`, because it should eagerly spawn the computation
    /// on an executor, even if you don’t explicitly `await` its results. A computation always runs
    /// to completion, dropping the returned future only discards its result for this caller.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidArgument`] immediately if `namespace` is empty, and
    /// [`CacheError::NoRuntime`] if `compute` has to be spawned outside of a tokio runtime. A
    /// stored entry is served without a runtime. The returned future fails with
    /// [`CacheError::ComputationFailure`] if `compute` fails, and every waiter of the same
    /// computation receives the same error.
    pub fn get<F, Fut>(
        &self,
        namespace: &str,
        options: GetOptions,
        compute: F,
    ) -> CacheResult<BoxFuture<'static, CacheResult<T>>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let namespace = Namespace::new(namespace)?;
        let name = &self.name;

        if options.bypass {
            let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
            metric!(counter(&format!("caches.{name}.bypass")) += 1);
            tracing::debug!(cache = %name, %namespace, "Bypassing cache");

            let (sender, receiver) = oneshot::channel();
            let guard = ComputationGuard {
                cache: self.clone(),
                namespace: namespace.clone(),
                id: None,
                sender: Some(sender),
            };
            self.spawn_computation(&runtime, guard, compute);

            let future = receiver.unwrap_or_else(move |_cancelled| {
                Err(CacheError::Interrupted(namespace))
            });
            return Ok(Box::pin(future));
        }

        let (channel, spawn) = {
            let mut state = self.state.lock();

            if let Some(value) = state.entries.get(&namespace) {
                metric!(counter(&format!("caches.{name}.memory.hit")) += 1);
                tracing::trace!(cache = %name, %namespace, "Serving stored value");
                return Ok(Box::pin(future::ready(Ok(value.clone()))));
            }

            if let Some(in_flight) = state.computations.get(&namespace) {
                // A concurrent lookup was deduplicated.
                metric!(counter(&format!("caches.{name}.channel.hit")) += 1);
                tracing::trace!(cache = %name, %namespace, "Joining running computation");
                (in_flight.channel.clone(), None)
            } else {
                let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
                metric!(counter(&format!("caches.{name}.channel.miss")) += 1);

                let id = state.next_id;
                state.next_id += 1;

                let (sender, receiver) = oneshot::channel();
                let channel = receiver.shared();
                let in_flight = InFlight {
                    id,
                    channel: channel.clone(),
                };
                let evicted = state.computations.insert(namespace.clone(), in_flight);
                debug_assert!(evicted.is_none());

                let guard = ComputationGuard {
                    cache: self.clone(),
                    namespace: namespace.clone(),
                    id: Some(id),
                    sender: Some(sender),
                };
                (channel, Some((runtime, guard)))
            }
        };

        // The lock is released at this point, the computation never runs while it is held.
        if let Some((runtime, guard)) = spawn {
            self.spawn_computation(&runtime, guard, compute);
        }

        let future = channel.unwrap_or_else(move |_cancelled| {
            Err(CacheError::Interrupted(namespace))
        });

        Ok(Box::pin(future))
    }

    /// Spawns `compute` on `runtime` and settles `guard` with its result.
    fn spawn_computation<F, Fut>(
        &self,
        runtime: &Handle,
        guard: ComputationGuard<T>,
        compute: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        tracing::debug!(
            cache = %self.name,
            namespace = %guard.namespace,
            "Starting computation"
        );

        let computation = async move {
            let start = Instant::now();
            let result = compute().await.map_err(CacheError::from);

            let name = &guard.cache.name;
            let status = match result {
                Ok(_) => "ok",
                Err(_) => "error",
            };
            metric!(
                timer(&format!("caches.{name}.computation.duration")) = start.elapsed(),
                "status" => status,
            );
            metric!(
                counter(&format!("caches.{name}.computation")) += 1,
                "status" => status,
            );

            guard.settle(result);
        }
        .bind_hub(Hub::new_from_top(Hub::current()));

        runtime.spawn(computation);
    }
}

/// Owns the sending half of a computation and its registration in the cache.
///
/// If the computation is dropped before it settles, for example because it panicked, the guard
/// unregisters it and drops the sender, so that all waiters receive
/// [`CacheError::Interrupted`].
struct ComputationGuard<T> {
    cache: NamespaceCache<T>,
    namespace: Namespace,
    /// The registration in `computations`, `None` for bypassing computations.
    id: Option<u64>,
    sender: Option<oneshot::Sender<CacheResult<T>>>,
}

impl<T: Clone> ComputationGuard<T> {
    fn settle(mut self, result: CacheResult<T>) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        if let Some(id) = self.id {
            // Publishing and unregistering happen atomically. Callers either find the
            // running computation and receive the result below, or they find the stored entry.
            let entries = {
                let mut state = self.cache.state.lock();
                if state.remove_computation(&self.namespace, id) {
                    if let Ok(value) = &result {
                        state.entries.insert(self.namespace.clone(), value.clone());
                    }
                }
                state.entries.len()
            };

            let name = &self.cache.name;
            match result {
                Ok(_) => tracing::debug!(
                    cache = %name,
                    namespace = %self.namespace,
                    "Stored computed value"
                ),
                Err(ref error) => tracing::debug!(
                    cache = %name,
                    namespace = %self.namespace,
                    %error,
                    "Computation failed"
                ),
            }
            metric!(gauge(&format!("caches.{name}.memory.entries")) = entries as u64);
        }

        // All waiters may have gone away already, which is fine.
        sender.send(result).ok();
    }
}

impl<T> Drop for ComputationGuard<T> {
    fn drop(&mut self) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        if let Some(id) = self.id {
            self.cache
                .state
                .lock()
                .remove_computation(&self.namespace, id);
        }

        let name = &self.cache.name;
        tracing::warn!(
            cache = %name,
            namespace = %self.namespace,
            "Computation was interrupted"
        );
        metric!(
            counter(&format!("caches.{name}.computation")) += 1,
            "status" => "interrupted",
        );

        // Unregister first, then notify, so that a waiter retrying right away starts afresh.
        drop(sender);
    }
}
