use crate::cache::TokenCache;
use std::{
    io,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};
use tracing::{debug, error, instrument, warn};

/// Possible errors when persisting the token cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache could not be serialized.
    #[error("failed to serialize token cache: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The cache file could not be written.
    #[error("failed to write token cache to {}: {source}", path.display())]
    Write {
        /// The cache file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// The single file a [`TokenCache`] is loaded from and saved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Create a store backed by the file at `path`. Nothing is read until
    /// [`CacheStore::load`] or [`CacheStore::open`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path of the cache file.
    #[allow(clippy::missing_const_for_fn)] // false positive, non-const deref
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache from disk.
    ///
    /// A missing file yields an empty cache. So does an unreadable or corrupt
    /// one, after logging a warning: the cache only saves logins, and a bad
    /// file is overwritten at the end of the run.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn load(&self) -> TokenCache {
        let blob = match std::fs::read_to_string(&self.path) {
            Ok(blob) => blob,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no token cache file, starting empty");
                return TokenCache::new();
            }
            Err(err) => {
                warn!(%err, "failed to read token cache, starting empty");
                return TokenCache::new();
            }
        };

        TokenCache::deserialize(&blob)
            .inspect(|cache| debug!(accounts = cache.accounts().len(), "loaded token cache"))
            .unwrap_or_else(|err| {
                warn!(%err, "token cache is corrupt, starting empty");
                TokenCache::new()
            })
    }

    /// Serialize the cache and overwrite the cache file.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, cache: &TokenCache) -> Result<(), CacheError> {
        let blob = cache.serialize()?;
        std::fs::write(&self.path, blob).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!(changed = cache.has_changed(), "saved token cache");
        Ok(())
    }

    /// Load the cache and tie it to this store. The returned guard writes the
    /// cache back when it is persisted or dropped.
    pub fn open(self) -> PersistGuard {
        let cache = self.load();
        PersistGuard {
            store: self,
            cache,
            persisted: false,
        }
    }
}

/// A loaded [`TokenCache`] that is saved exactly once, on every exit path.
///
/// Call [`PersistGuard::persist`] on the success path to observe write
/// errors. If the guard is dropped instead (an early return, a propagated
/// error, or a panic unwinding), the cache is saved from [`Drop`] and a
/// failure is logged. An abort or a kill signal skips the save.
#[derive(Debug)]
pub struct PersistGuard {
    store: CacheStore,
    cache: TokenCache,
    persisted: bool,
}

impl Deref for PersistGuard {
    type Target = TokenCache;

    fn deref(&self) -> &Self::Target {
        &self.cache
    }
}

impl DerefMut for PersistGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cache
    }
}

impl PersistGuard {
    /// Save the cache now, consuming the guard.
    pub fn persist(mut self) -> Result<(), CacheError> {
        self.persisted = true;
        self.store.save(&self.cache)
    }
}

impl Drop for PersistGuard {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(err) = self.store.save(&self.cache) {
            error!(%err, "failed to save token cache on exit");
        }
    }
}
