use crate::scopes::ScopeSet;
use chrono::{DateTime, Duration, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Version written into every serialized cache.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Access tokens that expire within this many seconds are treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Longest access token lifetime that is recorded as given.
pub const MAX_LIFETIME_DAYS: i64 = 365;

const fn current_version() -> u32 {
    CACHE_FORMAT_VERSION
}

/// A signed-in user, as identified by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Stable identifier, `<object id>.<tenant id>` when the provider supplies
    /// both.
    pub home_account_id: String,
    /// Host of the authority that issued the tokens.
    pub environment: String,
    /// The sign-in name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The tenant the user signed in to, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl Account {
    /// An account for tokens that came without any identity claims.
    pub fn unidentified(environment: &str) -> Self {
        Self {
            home_account_id: format!("unidentified@{environment}"),
            environment: environment.to_owned(),
            username: None,
            tenant_id: None,
        }
    }
}

/// A cached access token.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedAccessToken {
    /// The owning account.
    pub home_account_id: String,
    /// The application the token was issued to.
    pub client_id: String,
    /// The scopes the token grants.
    pub scopes: ScopeSet,
    /// The bearer token.
    pub secret: String,
    /// When the provider stops accepting the token.
    pub expires_at: DateTime<Utc>,
}

impl CachedAccessToken {
    /// True if the token is still usable at `now`, allowing for
    /// [`EXPIRY_MARGIN_SECS`].
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(EXPIRY_MARGIN_SECS))
            .is_some_and(|usable_until| usable_until > now)
    }

    /// The expiry of a token issued at `now` with lifetime `ttl`. Lifetimes
    /// are capped at [`MAX_LIFETIME_DAYS`].
    pub fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        now.checked_add_signed(ttl.min(Duration::days(MAX_LIFETIME_DAYS)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl fmt::Debug for CachedAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedAccessToken")
            .field("home_account_id", &self.home_account_id)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// A cached refresh token. One is kept per account and application.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedRefreshToken {
    /// The owning account.
    pub home_account_id: String,
    /// The application the token was issued to.
    pub client_id: String,
    /// The refresh token.
    pub secret: String,
}

impl fmt::Debug for CachedRefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedRefreshToken")
            .field("home_account_id", &self.home_account_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// A successful token response, ready to be recorded in a [`TokenCache`].
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// The account the tokens belong to.
    pub account: Account,
    /// The access token, carrying the application id and granted scopes.
    pub access_token: CachedAccessToken,
    /// The refresh token, if the provider issued one.
    pub refresh_token: Option<String>,
}

/// Accounts and tokens that survive between runs.
///
/// The cache is an opaque blob to everything outside this module: it is
/// serialized as JSON and written to a single file by the
/// [`CacheStore`](super::CacheStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    #[serde(default = "current_version")]
    version: u32,
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    access_tokens: Vec<CachedAccessToken>,
    #[serde(default)]
    refresh_tokens: Vec<CachedRefreshToken>,
    #[serde(skip)]
    changed: bool,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            accounts: Vec::new(),
            access_tokens: Vec::new(),
            refresh_tokens: Vec::new(),
            changed: false,
        }
    }
}

impl TokenCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a serialized cache.
    pub fn deserialize(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }

    /// Serialize the cache.
    pub fn serialize(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// True if the cache holds no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// True if [`TokenCache::record`] has been called since the cache was
    /// created or loaded.
    pub const fn has_changed(&self) -> bool {
        self.changed
    }

    /// All cached accounts, oldest first.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// The first cached account, if any.
    pub fn first_account(&self) -> Option<&Account> {
        self.accounts.first()
    }

    /// Find an access token for the account and application that grants
    /// every requested scope and is still fresh at `now`.
    pub fn find_access_token(
        &self,
        home_account_id: &str,
        client_id: &str,
        scopes: &ScopeSet,
        now: DateTime<Utc>,
    ) -> Option<&CachedAccessToken> {
        self.access_tokens.iter().find(|at| {
            at.home_account_id == home_account_id
                && at.client_id == client_id
                && at.scopes.contains_all(scopes)
                && at.is_fresh(now)
        })
    }

    /// Find the refresh token for the account and application.
    pub fn find_refresh_token(
        &self,
        home_account_id: &str,
        client_id: &str,
    ) -> Option<&CachedRefreshToken> {
        self.refresh_tokens
            .iter()
            .find(|rt| rt.home_account_id == home_account_id && rt.client_id == client_id)
    }

    /// Record a token response.
    ///
    /// The account is inserted or updated in place, keeping its position.
    /// Access tokens for the same account and application whose scopes
    /// overlap the new token are replaced. A returned refresh token replaces
    /// the previous one, since the provider may rotate them.
    pub fn record(&mut self, grant: TokenGrant) {
        let TokenGrant {
            account,
            access_token,
            refresh_token,
        } = grant;
        let id = account.home_account_id.clone();
        let client_id = access_token.client_id.clone();

        match self
            .accounts
            .iter_mut()
            .find(|existing| existing.home_account_id == id)
        {
            Some(existing) => *existing = account,
            None => self.accounts.push(account),
        }

        self.access_tokens.retain(|at| {
            at.home_account_id != id
                || at.client_id != client_id
                || !at.scopes.overlaps(&access_token.scopes)
        });
        self.access_tokens.push(access_token);

        if let Some(secret) = refresh_token {
            self.refresh_tokens
                .retain(|rt| rt.home_account_id != id || rt.client_id != client_id);
            self.refresh_tokens.push(CachedRefreshToken {
                home_account_id: id,
                client_id,
                secret,
            });
        }

        self.changed = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CLIENT: &str = "client-1";

    fn account(id: &str) -> Account {
        Account {
            home_account_id: id.to_owned(),
            environment: "login.microsoftonline.com".to_owned(),
            username: Some(format!("{id}@contoso.com")),
            tenant_id: None,
        }
    }

    fn grant(id: &str, scopes: &str, secret: &str, ttl: Duration, rt: Option<&str>) -> TokenGrant {
        let scopes = ScopeSet::from_delimited(scopes);
        TokenGrant {
            account: account(id),
            access_token: CachedAccessToken {
                home_account_id: id.to_owned(),
                client_id: CLIENT.to_owned(),
                scopes,
                secret: secret.to_owned(),
                expires_at: Utc::now() + ttl,
            },
            refresh_token: rt.map(str::to_owned),
        }
    }

    #[test]
    fn expiry_is_clamped() {
        let now = Utc::now();
        assert_eq!(
            CachedAccessToken::expiry(now, Duration::hours(1)),
            now + Duration::hours(1)
        );
        assert_eq!(
            CachedAccessToken::expiry(now, Duration::seconds(9_000_000_000_000)),
            now + Duration::days(MAX_LIFETIME_DAYS)
        );
        assert_eq!(
            CachedAccessToken::expiry(DateTime::<Utc>::MAX_UTC, Duration::hours(1)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn freshness_at_date_limits() {
        let mut token = grant("a", "User.Read", "at", Duration::hours(1), None).access_token;

        token.expires_at = DateTime::<Utc>::MIN_UTC;
        assert!(!token.is_fresh(Utc::now()));

        token.expires_at = DateTime::<Utc>::MAX_UTC;
        assert!(token.is_fresh(Utc::now()));
    }

    #[test]
    fn empty_cache() {
        let cache = TokenCache::new();
        assert!(cache.is_empty());
        assert!(cache.first_account().is_none());
        assert!(!cache.has_changed());
    }

    #[test]
    fn record_and_find() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read Mail.Read", "at-1", Duration::hours(1), Some("rt-1")));

        assert!(cache.has_changed());
        assert_eq!(cache.first_account().unwrap().home_account_id, "a");

        let wanted = ScopeSet::from_delimited("user.read");
        let at = cache
            .find_access_token("a", CLIENT, &wanted, Utc::now())
            .unwrap();
        assert_eq!(at.secret, "at-1");
        assert!(cache
            .find_access_token("a", "other-client", &wanted, Utc::now())
            .is_none());
        assert!(cache
            .find_access_token("a", CLIENT, &ScopeSet::from_delimited("Files.Read"), Utc::now())
            .is_none());

        assert_eq!(cache.find_refresh_token("a", CLIENT).unwrap().secret, "rt-1");
    }

    #[test]
    fn expiring_tokens_are_skipped() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read", "at-1", Duration::minutes(4), None));

        let wanted = ScopeSet::from_delimited("User.Read");
        assert!(cache
            .find_access_token("a", CLIENT, &wanted, Utc::now())
            .is_none());
    }

    #[test]
    fn record_replaces_overlapping_tokens_and_rotates_refresh_token() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read", "at-1", Duration::hours(1), Some("rt-1")));
        cache.record(grant("a", "Files.Read", "at-files", Duration::hours(1), None));
        cache.record(grant("a", "User.Read Mail.Read", "at-2", Duration::hours(1), Some("rt-2")));

        assert_eq!(cache.accounts().len(), 1);
        assert_eq!(cache.access_tokens.len(), 2);
        let wanted = ScopeSet::from_delimited("User.Read");
        assert_eq!(
            cache
                .find_access_token("a", CLIENT, &wanted, Utc::now())
                .unwrap()
                .secret,
            "at-2"
        );
        assert_eq!(cache.refresh_tokens.len(), 1);
        assert_eq!(cache.find_refresh_token("a", CLIENT).unwrap().secret, "rt-2");
    }

    #[test]
    fn missing_refresh_token_keeps_previous() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read", "at-1", Duration::hours(1), Some("rt-1")));
        cache.record(grant("a", "User.Read", "at-2", Duration::hours(1), None));

        assert_eq!(cache.find_refresh_token("a", CLIENT).unwrap().secret, "rt-1");
    }

    #[test]
    fn account_order_is_stable() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read", "at-a", Duration::hours(1), None));
        cache.record(grant("b", "User.Read", "at-b", Duration::hours(1), None));
        cache.record(grant("a", "User.Read", "at-a2", Duration::hours(1), None));

        let ids: Vec<_> = cache
            .accounts()
            .iter()
            .map(|a| a.home_account_id.as_str())
            .collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn serialized_blob_keeps_tokens_and_drops_change_flag() {
        let mut cache = TokenCache::new();
        cache.record(grant("a", "User.Read", "at-1", Duration::hours(1), Some("rt-1")));

        let blob = cache.serialize().unwrap();
        let restored = TokenCache::deserialize(&blob).unwrap();

        assert!(!restored.has_changed());
        assert_eq!(restored.version, CACHE_FORMAT_VERSION);
        assert_eq!(restored.accounts(), cache.accounts());
        assert_eq!(
            restored.find_refresh_token("a", CLIENT).unwrap().secret,
            "rt-1"
        );
    }

    #[test]
    fn tolerates_sparse_blob() {
        let cache = TokenCache::deserialize("{}").unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.version, CACHE_FORMAT_VERSION);
    }

    #[test]
    fn debug_redacts_secrets() {
        let g = grant("a", "User.Read", "super-secret", Duration::hours(1), None);
        assert!(!format!("{:?}", g.access_token).contains("super-secret"));
    }
}
