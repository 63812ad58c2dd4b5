//! Short-TTL permission cache and in-flight request coalescing.
//!
//! Neither type is a source of truth: the session container is. Dropping
//! every entry only costs extra backend calls.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::config::DEFAULT_PERMISSION_CACHE_TTL;

/// Wall-clock source (injectable for tests).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
}

/// Keyed store whose entries expire `ttl` after `set`.
pub struct PermissionCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> PermissionCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            clock,
        }
    }

    /// Fresh value for `key`; expired entries are evicted on the way.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if self.fresh(entry, now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
        };
        self.lock().insert(key.into(), entry);
    }

    pub fn is_valid(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.lock().get(key).is_some_and(|e| self.fresh(e, now))
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn invalidate_all(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fresh(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.stored_at) < self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V: Clone> Default for PermissionCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_PERMISSION_CACHE_TTL)
    }
}

impl<V> core::fmt::Debug for PermissionCache<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PermissionCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// At most one in-flight request per key; concurrent callers await the same
/// result.
pub struct Coalescer<V, E> {
    in_flight: Mutex<HashMap<String, InFlight<V, E>>>,
}

impl<V, E> Coalescer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Join the request running under `key`, or start one with `start`.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let request = {
            let mut in_flight = self.lock();
            match in_flight.get(key) {
                Some(request) => {
                    tracing::debug!(key, "joining in-flight request");
                    request.clone()
                }
                None => {
                    let request = start().boxed().shared();
                    in_flight.insert(key.to_string(), request.clone());
                    request
                }
            }
        };

        let result = request.clone().await;

        // Whoever finishes first retires the entry; a newer request under the
        // same key is left alone.
        let mut in_flight = self.lock();
        if in_flight.get(key).is_some_and(|current| current.ptr_eq(&request)) {
            in_flight.remove(key);
        }

        result
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlight<V, E>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<V, E> Default for Coalescer<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V, E> core::fmt::Debug for Coalescer<V, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Coalescer").finish_non_exhaustive()
    }
}
