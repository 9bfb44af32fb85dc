//! In-flight login attempts keyed by the value the provider echoes back.
//!
//! For OAuth1 the key is the temporary (request) token and the secret is its
//! token secret. For OAuth2 the key is the `state` parameter and the secret is
//! the PKCE verifier. Entries expire after the configured TTL and are consumed
//! with [`PendingLoginStore::take`], which removes and returns in one locked step.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Live entries allowed per store unless configured otherwise.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// What must survive the round trip through the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct PendingLogin {
    pub secret: String,
    /// Validated site-local path to land on after login.
    pub redirect: String,
}

impl std::fmt::Debug for PendingLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingLogin")
            .field("secret", &"***")
            .field("redirect", &self.redirect)
            .finish()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("too many logins in progress (limit {limit})")]
pub struct StoreFull {
    pub limit: usize,
}

pub trait PendingLoginStore: Send + Sync {
    /// # Errors
    /// Returns [`StoreFull`] when the store already holds its limit of live entries.
    fn put(&self, key: String, login: PendingLogin) -> Result<(), StoreFull>;
    fn get(&self, key: &str) -> Option<PendingLogin>;
    fn delete(&self, key: &str);
    /// Remove and return a live entry. Concurrent callers presenting the same
    /// key get it at most once between them.
    fn take(&self, key: &str) -> Option<PendingLogin>;
    /// Number of live (unexpired) entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Entry {
    login: PendingLogin,
    created_at: Instant,
}

/// The map plus insertion order, oldest first. `order` may hold keys that
/// were already taken or replaced; those are skipped by comparing timestamps.
#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    order: VecDeque<(Instant, String)>,
}

impl Entries {
    fn is_current(map: &HashMap<String, Entry>, created_at: Instant, key: &str) -> bool {
        map.get(key).is_some_and(|entry| entry.created_at == created_at)
    }

    /// Drop expired entries from the front of `order`. Amortized O(1) per put.
    fn prune(&mut self, ttl: Duration, max_entries: usize) {
        while let Some(created_at) = self.order.front().map(|(created_at, _)| *created_at) {
            if created_at.elapsed() < ttl {
                break;
            }
            if let Some((created_at, key)) = self.order.pop_front() {
                if Self::is_current(&self.map, created_at, &key) {
                    self.map.remove(&key);
                }
            }
        }

        // take/delete leave stale keys behind; compact once they dominate.
        if self.order.len() > max_entries.saturating_mul(2) {
            let Self { map, order } = self;
            order.retain(|(created_at, key)| Self::is_current(map, *created_at, key));
        }
    }
}

pub struct MemoryPendingStore {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl MemoryPendingStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: Mutex::new(Entries::default()),
        }
    }

    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    // Nothing here can leave the map half-updated, so a poisoned lock is still usable.
    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PendingLoginStore for MemoryPendingStore {
    fn put(&self, key: String, login: PendingLogin) -> Result<(), StoreFull> {
        let mut entries = self.entries();
        entries.prune(self.ttl, self.max_entries);

        if entries.map.len() >= self.max_entries && !entries.map.contains_key(&key) {
            return Err(StoreFull {
                limit: self.max_entries,
            });
        }

        let created_at = Instant::now();
        entries.order.push_back((created_at, key.clone()));
        entries.map.insert(key, Entry { login, created_at });
        Ok(())
    }

    fn get(&self, key: &str) -> Option<PendingLogin> {
        let entries = self.entries();
        entries
            .map
            .get(key)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.login.clone())
    }

    fn delete(&self, key: &str) {
        self.entries().map.remove(key);
    }

    fn take(&self, key: &str) -> Option<PendingLogin> {
        let mut entries = self.entries();
        if let Some(entry) = entries.map.remove(key) {
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.login);
            }
        }
        None
    }

    fn len(&self) -> usize {
        let mut entries = self.entries();
        entries.prune(self.ttl, self.max_entries);
        entries.map.len()
    }
}
