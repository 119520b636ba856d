//! The token cache and the file it lives in.

mod model;
pub use model::{
    Account, CachedAccessToken, CachedRefreshToken, TokenCache, TokenGrant, CACHE_FORMAT_VERSION,
    EXPIRY_MARGIN_SECS, MAX_LIFETIME_DAYS,
};

mod store;
pub use store::{CacheError, CacheStore, PersistGuard};
