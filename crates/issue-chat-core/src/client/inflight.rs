//! In-flight request de-duplication.
//!
//! Concurrent reads with the same [`CacheKey`] share one network call. The call
//! runs in its own spawned task, so it completes even when every waiter has
//! gone away, and its registration is removed by a guard that drops when the
//! task ends, whether it finished, failed or panicked.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::debug;

use super::cache::{CacheKey, Payload};
use crate::error::ApiError;

type SharedCall = Shared<BoxFuture<'static, Result<Payload, ApiError>>>;
type CallMap = HashMap<CacheKey, (u64, SharedCall)>;

/// Registry of pending calls keyed by request identity.
#[derive(Clone, Default)]
pub struct InFlightRegistry {
    calls: Arc<Mutex<CallMap>>,
    next_id: Arc<AtomicU64>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `call` unless one is already pending for `key`, in which case wait
    /// for that one instead. Every waiter receives the same result.
    pub async fn run<F>(&self, key: CacheKey, call: F) -> Result<Payload, ApiError>
    where
        F: Future<Output = Result<Payload, ApiError>> + Send + 'static,
    {
        let shared = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

            if let Some((_, pending)) = calls.get(&key) {
                debug!(key = %key, "Joining in-flight request");
                pending.clone()
            } else {
                // Registration happens under the lock, before the task can
                // settle, so the guard always finds its own entry.
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let guard = Registration {
                    calls: Arc::clone(&self.calls),
                    key: key.clone(),
                    id,
                };

                let task = tokio::spawn(async move {
                    let _guard = guard;
                    call.await
                });

                let shared = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(ApiError::Configuration {
                            message: format!("Request task failed: {}", e),
                        })
                    })
                }
                .boxed()
                .shared();

                calls.insert(key, (id, shared.clone()));
                shared
            }
        };

        shared.await
    }

    /// Detach pending calls whose key matches `predicate`.
    ///
    /// Detached calls still run to completion for the callers already
    /// waiting on them, but later callers start a fresh call. Returns how
    /// many were detached.
    pub fn forget_where(&self, predicate: impl Fn(&CacheKey) -> bool) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        let before = calls.len();
        calls.retain(|key, _| !predicate(key));
        let forgotten = before - calls.len();
        if forgotten > 0 {
            debug!(forgotten, "Detached in-flight requests");
        }
        forgotten
    }

    /// Number of calls currently pending.
    pub fn len(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for InFlightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

/// Removes a call's registration when its task ends.
struct Registration {
    calls: Arc<Mutex<CallMap>>,
    key: CacheKey,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        if calls.get(&self.key).is_some_and(|(id, _)| *id == self.id) {
            calls.remove(&self.key);
        }
    }
}

#[cfg(test)]
#[path = "inflight_tests.rs"]
mod tests;
