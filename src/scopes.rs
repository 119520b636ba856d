use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// OIDC scopes the identity platform adds to every request. They never
/// appear in an access token's scope set, so they take no part in matching.
pub const RESERVED_SCOPES: [&str; 3] = ["openid", "profile", "offline_access"];

/// A normalized set of resource scopes.
///
/// Scopes are compared case-insensitively, and the [`RESERVED_SCOPES`] are
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    /// True if the set has no resource scopes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if every scope in `other` is also in `self`.
    pub fn contains_all(&self, other: &Self) -> bool {
        other.0.is_subset(&self.0)
    }

    /// True if the two sets share at least one scope.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Iterate the scopes in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Parse a space-delimited `scope` string, as returned in token responses.
    pub fn from_delimited(scope: &str) -> Self {
        scope.split_whitespace().collect()
    }
}

/// The `scope` parameter of a provider request: the configured scopes as
/// written and in order, then any [`RESERVED_SCOPES`] they do not already
/// name, so the provider returns an id token and a refresh token. Blank and
/// repeated entries are dropped.
pub fn request_scopes<S: AsRef<str>>(configured: &[S]) -> Vec<String> {
    let mut request: Vec<String> = Vec::with_capacity(configured.len() + RESERVED_SCOPES.len());
    let configured = configured.iter().map(|s| s.as_ref().trim());
    for scope in configured.chain(RESERVED_SCOPES) {
        if !scope.is_empty() && !request.iter().any(|r| r.eq_ignore_ascii_case(scope)) {
            request.push(scope.to_owned());
        }
    }
    request
}

impl<S: AsRef<str>> FromIterator<S> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty() && !RESERVED_SCOPES.contains(&s.as_str()))
                .collect(),
        )
    }
}
