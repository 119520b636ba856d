use crate::cache::Account;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;

/// Possible errors when reading an id token.
#[derive(Debug, thiserror::Error)]
pub enum ClaimsError {
    /// The token does not have three dot-separated segments.
    #[error("id token is not a compact JWT")]
    NotAJwt,
    /// The payload segment is not base64url.
    #[error("id token payload is not base64url: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The payload is not a JSON claims object.
    #[error("id token payload is not a claims object: {0}")]
    Json(#[from] serde_json::Error),
}

/// The identity claims used to key cached tokens.
///
/// The signature is not checked. The claims only key the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdTokenClaims {
    /// Object id of the user.
    #[serde(default)]
    pub oid: Option<String>,
    /// Tenant id.
    #[serde(default)]
    pub tid: Option<String>,
    /// Subject.
    #[serde(default)]
    pub sub: Option<String>,
    /// Sign-in name.
    #[serde(default)]
    pub preferred_username: Option<String>,
}

impl IdTokenClaims {
    /// Decode the payload of a compact JWT.
    pub fn decode(id_token: &str) -> Result<Self, ClaimsError> {
        let mut segments = id_token.split('.');
        let (Some(_), Some(payload), Some(_), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(ClaimsError::NotAJwt);
        };

        let json = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
        Ok(serde_json::from_slice(&json)?)
    }

    /// The account identifier: `oid.tid` when both are present, otherwise
    /// `sub`.
    pub fn home_account_id(&self) -> Option<String> {
        match (&self.oid, &self.tid) {
            (Some(oid), Some(tid)) => Some(format!("{oid}.{tid}")),
            _ => self.sub.clone(),
        }
    }

    /// Build the cached account, or [`None`] if the claims carry no
    /// identifier.
    pub fn into_account(self, environment: &str) -> Option<Account> {
        let home_account_id = self.home_account_id()?;
        Some(Account {
            home_account_id,
            environment: environment.to_owned(),
            username: self.preferred_username,
            tenant_id: self.tid,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn jwt(claims: serde_json::Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    #[test]
    fn decodes_identity() {
        let token = jwt(serde_json::json!({
            "oid": "00000000-0000-0000-66f3-3332eca7ea81",
            "tid": "9188040d-6c67-4c5b-b112-36a304b66dad",
            "sub": "AAAAAAAAAAAAAAAAAAAAAIkzqFVrSaSaFHy782bbtaQ",
            "preferred_username": "megan@contoso.com",
        }));

        let account = IdTokenClaims::decode(&token)
            .unwrap()
            .into_account("login.microsoftonline.com")
            .unwrap();
        assert_eq!(
            account.home_account_id,
            "00000000-0000-0000-66f3-3332eca7ea81.9188040d-6c67-4c5b-b112-36a304b66dad"
        );
        assert_eq!(account.username.as_deref(), Some("megan@contoso.com"));
        assert_eq!(account.environment, "login.microsoftonline.com");
    }

    #[test]
    fn falls_back_to_sub() {
        let token = jwt(serde_json::json!({ "sub": "subject" }));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert_eq!(claims.home_account_id().as_deref(), Some("subject"));
    }

    #[test]
    fn no_identifier() {
        let token = jwt(serde_json::json!({ "name": "Megan" }));
        let claims = IdTokenClaims::decode(&token).unwrap();
        assert!(claims.into_account("login.microsoftonline.com").is_none());
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            IdTokenClaims::decode("only.two"),
            Err(ClaimsError::NotAJwt)
        ));
        assert!(matches!(
            IdTokenClaims::decode("a.!!!.c"),
            Err(ClaimsError::Base64(_))
        ));
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(matches!(
            IdTokenClaims::decode(&not_json),
            Err(ClaimsError::Json(_))
        ));
    }
}
