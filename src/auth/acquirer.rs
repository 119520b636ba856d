use crate::{
    auth::{
        claims::IdTokenClaims,
        provider::{
            DeviceAuthorization, DevicePollError, IdentityProvider, ProviderTokenResponse,
            TokenRequestError,
        },
    },
    cache::{Account, CachedAccessToken, TokenCache, TokenGrant, MAX_LIFETIME_DAYS},
    scopes::{request_scopes, ScopeSet},
};
use chrono::{Duration, Utc};
use oauth2::{AccessToken, RequestTokenError, TokenResponse};
use std::io::{self, Write};
use tracing::{debug, info, instrument, warn};

/// Possible errors when acquiring an access token. All of them end the run.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    /// The refresh request did not reach the provider.
    #[error("failed to reach the token endpoint: {0}")]
    Refresh(#[source] TokenRequestError),
    /// The device flow could not be started.
    #[error("failed to start device flow: {0}")]
    DeviceAuthorization(#[source] TokenRequestError),
    /// The device authorization response has no usable user code.
    #[error("failed to create device flow: {reason}")]
    MalformedDeviceAuthorization {
        /// What was wrong with the response.
        reason: String,
    },
    /// Polling for the device flow result failed in transport.
    #[error("failed to poll for device flow completion: {0}")]
    DevicePoll(#[source] DevicePollError),
    /// The provider ended the device flow with an error.
    #[error("device flow failed: {error}")]
    DeviceFlowFailed {
        /// The provider's error code.
        error: String,
        /// The provider's error description.
        description: Option<String>,
    },
    /// Instructions or error details could not be written to the console.
    #[error("failed to write to console: {0}")]
    Console(#[from] io::Error),
}

/// Why silent acquisition did not produce a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    /// The cache holds no accounts.
    NoAccounts,
    /// The account has no fresh access token and no refresh token.
    NoRefreshToken,
    /// The provider refused the refresh token, e.g. because it expired.
    RefreshRejected {
        /// The provider's error code.
        error: String,
    },
    /// The provider answered the refresh with something that is not a token
    /// response.
    MalformedRefreshResponse,
}

/// Result of looking for a token without user interaction.
#[derive(Debug)]
pub enum SilentOutcome {
    /// A token was found in the cache or obtained with a refresh token.
    Hit(AccessToken),
    /// The user has to sign in.
    Miss(MissReason),
}

/// Result of a completed device flow.
#[derive(Debug)]
pub enum DeviceFlowOutcome {
    /// The user signed in.
    Success(AccessToken),
    /// The provider ended the flow with an error, e.g. the user declined or
    /// the code expired.
    Fail {
        /// The provider's error code.
        error: String,
        /// The provider's error description.
        description: Option<String>,
    },
}

/// Obtains an access token for one application and scope set, trying the
/// token cache first and falling back to the device flow.
///
/// Every token the provider issues is recorded in the cache, whichever path
/// produced it.
#[derive(Debug)]
pub struct TokenAcquirer<'a> {
    provider: &'a IdentityProvider,
    cache: &'a mut TokenCache,
    scopes: ScopeSet,
    request: Vec<String>,
}

impl<'a> TokenAcquirer<'a> {
    /// Create an acquirer for `scopes`.
    pub fn new<S: AsRef<str>>(
        provider: &'a IdentityProvider,
        cache: &'a mut TokenCache,
        scopes: &[S],
    ) -> Self {
        Self {
            provider,
            cache,
            scopes: scopes.iter().collect(),
            request: request_scopes(scopes),
        }
    }

    /// Get an access token. Sign-in instructions and device flow errors are
    /// written to `console`.
    #[instrument(skip_all, fields(client_id = %self.provider.client_id()))]
    pub async fn acquire<W: Write>(&mut self, console: &mut W) -> Result<AccessToken, AcquireError> {
        let reason = match self.silent().await? {
            SilentOutcome::Hit(token) => {
                info!("acquired token silently");
                return Ok(token);
            }
            SilentOutcome::Miss(reason) => reason,
        };

        info!(?reason, "silent acquisition missed, starting device flow");
        match self.device_flow(console).await? {
            DeviceFlowOutcome::Success(token) => {
                info!("acquired token by device flow");
                Ok(token)
            }
            DeviceFlowOutcome::Fail { error, description } => {
                writeln!(console, "{error}")?;
                if let Some(description) = &description {
                    writeln!(console, "{description}")?;
                }
                Err(AcquireError::DeviceFlowFailed { error, description })
            }
        }
    }

    /// Look for a token for the first cached account without involving the
    /// user. A fresh cached access token is returned as is. Otherwise the
    /// account's refresh token is redeemed.
    #[instrument(skip_all)]
    pub async fn silent(&mut self) -> Result<SilentOutcome, AcquireError> {
        let Some(account) = self.cache.first_account().cloned() else {
            return Ok(SilentOutcome::Miss(MissReason::NoAccounts));
        };
        let client_id = self.provider.client_id();

        if let Some(cached) =
            self.cache
                .find_access_token(&account.home_account_id, client_id, &self.scopes, Utc::now())
        {
            debug!(account = %account.home_account_id, "using cached access token");
            return Ok(SilentOutcome::Hit(AccessToken::new(cached.secret.clone())));
        }

        let Some(refresh_token) = self
            .cache
            .find_refresh_token(&account.home_account_id, client_id)
            .map(|rt| rt.secret.clone())
        else {
            return Ok(SilentOutcome::Miss(MissReason::NoRefreshToken));
        };

        match self.provider.refresh(&refresh_token, &self.request).await {
            Ok(response) => Ok(SilentOutcome::Hit(self.record(&response, Some(&account)))),
            Err(RequestTokenError::ServerResponse(err)) => {
                warn!(
                    error = %err.error(),
                    description = err.error_description().map(String::as_str).unwrap_or_default(),
                    "refresh token rejected"
                );
                Ok(SilentOutcome::Miss(MissReason::RefreshRejected {
                    error: err.error().to_string(),
                }))
            }
            Err(RequestTokenError::Parse(err, _)) => {
                warn!(%err, "unreadable refresh response");
                Ok(SilentOutcome::Miss(MissReason::MalformedRefreshResponse))
            }
            Err(err) => Err(AcquireError::Refresh(err)),
        }
    }

    /// Run the device flow: request a code, show the user where to enter
    /// it, then block until the provider reports the outcome.
    #[instrument(skip_all)]
    pub async fn device_flow<W: Write>(
        &mut self,
        console: &mut W,
    ) -> Result<DeviceFlowOutcome, AcquireError> {
        let details = match self.provider.start_device_flow(&self.request).await {
            Ok(details) => details,
            Err(RequestTokenError::Parse(err, body)) => {
                return Err(AcquireError::MalformedDeviceAuthorization {
                    reason: format!("{err}. Response: {}", String::from_utf8_lossy(&body)),
                })
            }
            Err(err) => return Err(AcquireError::DeviceAuthorization(err)),
        };

        if details.user_code().secret().trim().is_empty() {
            return Err(AcquireError::MalformedDeviceAuthorization {
                reason: "response has an empty user_code".to_owned(),
            });
        }

        write_instructions(console, &details)?;

        match self.provider.poll_device_flow(&details).await {
            Ok(response) => Ok(DeviceFlowOutcome::Success(self.record(&response, None))),
            Err(RequestTokenError::ServerResponse(err)) => Ok(DeviceFlowOutcome::Fail {
                error: err.error().to_string(),
                description: err.error_description().cloned(),
            }),
            Err(RequestTokenError::Other(message)) => Ok(DeviceFlowOutcome::Fail {
                error: message,
                description: None,
            }),
            Err(err) => Err(AcquireError::DevicePoll(err)),
        }
    }

    /// Record a token response in the cache and return its access token.
    ///
    /// The account comes from the id token when it carries an identity,
    /// otherwise from `known` (the account whose refresh token was used).
    fn record(&mut self, response: &ProviderTokenResponse, known: Option<&Account>) -> AccessToken {
        let environment = self.provider.environment();

        let account = response
            .extra_fields()
            .id_token
            .as_deref()
            .and_then(|raw| {
                IdTokenClaims::decode(raw)
                    .inspect_err(|err| warn!(%err, "ignoring unreadable id token"))
                    .ok()
            })
            .and_then(|claims| claims.into_account(environment))
            .or_else(|| known.cloned())
            .unwrap_or_else(|| Account::unidentified(environment));

        let scopes = response
            .scopes()
            .map(|granted| granted.iter().map(|scope| scope.as_str()).collect::<ScopeSet>())
            .filter(|granted| !granted.is_empty())
            .unwrap_or_else(|| self.scopes.clone());

        let ttl = response
            .expires_in()
            .map(|expires_in| {
                Duration::from_std(expires_in)
                    .unwrap_or_else(|_| Duration::days(MAX_LIFETIME_DAYS))
            })
            .unwrap_or_else(Duration::zero);

        let token = response.access_token().clone();
        debug!(
            account = %account.home_account_id,
            expires_in = ttl.num_seconds(),
            refresh_token = response.refresh_token().is_some(),
            "recording token"
        );

        self.cache.record(TokenGrant {
            access_token: CachedAccessToken {
                home_account_id: account.home_account_id.clone(),
                client_id: self.provider.client_id().to_owned(),
                scopes,
                secret: token.secret().clone(),
                expires_at: CachedAccessToken::expiry(Utc::now(), ttl),
            },
            refresh_token: response.refresh_token().map(|rt| rt.secret().clone()),
            account,
        });

        token
    }
}

fn write_instructions<W: Write>(console: &mut W, details: &DeviceAuthorization) -> io::Result<()> {
    match details.extra_fields().message.as_deref() {
        Some(message) => writeln!(console, "{message}")?,
        None => writeln!(
            console,
            "To sign in, use a web browser to open the page {} and enter the code {} to authenticate.",
            details.verification_uri(),
            details.user_code().secret()
        )?,
    }
    writeln!(
        console,
        "Program execution will continue automatically after authentication."
    )?;
    console.flush()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn instructions_prefer_provider_message() {
        let details: DeviceAuthorization = serde_json::from_value(serde_json::json!({
            "device_code": "dc",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "message": "Go to https://microsoft.com/devicelogin and type ABCD-EFGH.",
        }))
        .unwrap();

        let mut out = Vec::new();
        write_instructions(&mut out, &details).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Go to https://microsoft.com/devicelogin and type ABCD-EFGH.\n"));
        assert!(out.ends_with("continue automatically after authentication.\n"));
    }

    #[test]
    fn instructions_without_message() {
        let details: DeviceAuthorization = serde_json::from_value(serde_json::json!({
            "device_code": "dc",
            "user_code": "WXYZ-1234",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
        }))
        .unwrap();

        let mut out = Vec::new();
        write_instructions(&mut out, &details).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("https://microsoft.com/devicelogin"));
        assert!(out.contains("WXYZ-1234"));
    }
}
