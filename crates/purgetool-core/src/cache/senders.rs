//! Discovered senders, remembered per account.

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info};

use super::CacheStore;
use crate::Result;
use crate::service::CleanserService;

/// Cache key holding `{user: [senders]}` for every account.
pub const SENDERS_KEY: &str = "unique-senders";

type SenderMap = BTreeMap<String, Vec<String>>;

/// Per-account sender sets stored under [`SENDERS_KEY`].
#[derive(Debug, Clone)]
pub struct SenderCache {
    store: CacheStore,
}

impl SenderCache {
    /// Creates a sender cache on top of a store.
    #[must_use]
    pub const fn new(store: CacheStore) -> Self {
        Self { store }
    }

    fn load_map(&self) -> Result<SenderMap> {
        Ok(self.store.get(SENDERS_KEY, None)?.unwrap_or_default())
    }

    /// Returns the cached senders of `user`. An empty set counts as not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    pub fn load(&self, user: &str) -> Result<Option<HashSet<String>>> {
        Ok(self
            .load_map()?
            .remove(user)
            .filter(|senders| !senders.is_empty())
            .map(|senders| senders.into_iter().collect()))
    }

    /// Replaces the cached senders of `user`, keeping other accounts' entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn store(&self, user: &str, senders: &HashSet<String>) -> Result<()> {
        let mut map = self.load_map()?;
        let mut list: Vec<String> = senders.iter().cloned().collect();
        list.sort();
        map.insert(user.to_string(), list);
        self.store.set(SENDERS_KEY, &map)
    }

    /// Drops `senders` from the cached set of `user`, after their mail is gone.
    ///
    /// Does nothing when `user` has no entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read or written.
    pub fn forget(&self, user: &str, senders: &[String]) -> Result<()> {
        let mut map = self.load_map()?;
        let Some(cached) = map.get_mut(user) else {
            return Ok(());
        };
        let before = cached.len();
        cached.retain(|sender| !senders.contains(sender));
        debug!(user, removed = before - cached.len(), "Forgot purged senders");
        self.store.set(SENDERS_KEY, &map)
    }

    /// Returns the senders of the service's account.
    ///
    /// Uses the cache when `use_cache` is set and an entry exists; otherwise scans
    /// the mailbox and stores the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox scan or the cache write fails.
    pub fn discover(&self, service: &mut CleanserService<'_>, use_cache: bool) -> Result<HashSet<String>> {
        let user = service.user().to_string();
        if use_cache && let Some(senders) = self.load(&user)? {
            debug!(user, count = senders.len(), "Using cached senders");
            return Ok(senders);
        }

        let senders = service.discover_senders()?;
        self.store(&user, &senders)?;
        info!(user, count = senders.len(), "Refreshed sender cache");
        Ok(senders)
    }
}
