use oauth2::{
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
    Client, ClientId, DeviceAuthorizationResponse, DeviceAuthorizationUrl,
    DeviceCodeErrorResponse, EndpointNotSet, EndpointSet, ExtraDeviceAuthorizationFields,
    ExtraTokenFields, HttpClientError, RefreshToken, RequestTokenError, Scope,
    StandardRevocableToken, StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

/// Extra fields the identity platform returns alongside the access token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
    /// The OpenID Connect id token, present when `openid` was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Extra fields the identity platform returns when a device flow starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCodeMessage {
    /// Ready-made sign-in instructions for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExtraDeviceAuthorizationFields for DeviceCodeMessage {}

/// A token endpoint response.
pub type ProviderTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

/// A device authorization endpoint response.
pub type DeviceAuthorization = DeviceAuthorizationResponse<DeviceCodeMessage>;

/// Errors from the token endpoint (refresh) or the device authorization
/// endpoint.
pub type TokenRequestError = RequestTokenError<HttpClientError<reqwest::Error>, BasicErrorResponse>;

/// Errors from polling the token endpoint during a device flow.
pub type DevicePollError =
    RequestTokenError<HttpClientError<reqwest::Error>, DeviceCodeErrorResponse>;

type ProviderClient = Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Possible errors when setting up the identity provider client.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// An endpoint derived from the authority is not a valid URL.
    #[error("invalid endpoint for authority {authority}: {source}")]
    InvalidEndpoint {
        /// The configured authority.
        authority: Url,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// A public (secretless) client of an OAuth2 authority that supports the
/// device authorization grant.
///
/// The device code endpoint is `{authority}/oauth2/v2.0/devicecode` and the
/// token endpoint is `{authority}/oauth2/v2.0/token`.
#[derive(Debug)]
pub struct IdentityProvider {
    client: ProviderClient,
    http: reqwest::Client,
    client_id: String,
    environment: String,
}

fn endpoint(authority: &Url, path: &str) -> String {
    format!(
        "{}/oauth2/v2.0/{path}",
        authority.as_str().trim_end_matches('/')
    )
}

impl IdentityProvider {
    /// Create a provider client for the application `client_id` at
    /// `authority`.
    pub fn new(authority: &Url, client_id: &str) -> Result<Self, ProviderError> {
        let invalid = |source| ProviderError::InvalidEndpoint {
            authority: authority.clone(),
            source,
        };

        let device_url =
            DeviceAuthorizationUrl::new(endpoint(authority, "devicecode")).map_err(invalid)?;
        let token_url = TokenUrl::new(endpoint(authority, "token")).map_err(invalid)?;

        let client: ProviderClient = Client::new(ClientId::new(client_id.to_owned()))
            .set_device_authorization_url(device_url)
            .set_token_uri(token_url);

        // NB: this is MANDATORY
        // https://docs.rs/oauth2/latest/oauth2/#security-warning
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            http,
            client_id: client_id.to_owned(),
            environment: authority.host_str().unwrap_or_default().to_owned(),
        })
    }

    /// Get the application (client) identifier.
    #[allow(clippy::missing_const_for_fn)] // false positive, non-const deref
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the authority host, recorded on cached accounts.
    #[allow(clippy::missing_const_for_fn)] // false positive, non-const deref
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Redeem a refresh token for a new access token covering `scopes`,
    /// which are sent as given.
    #[instrument(skip_all)]
    pub async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<ProviderTokenResponse, TokenRequestError> {
        let refresh_token = RefreshToken::new(refresh_token.to_owned());

        debug!("redeeming refresh token");
        self.client
            .exchange_refresh_token(&refresh_token)
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .request_async(&self.http)
            .await
    }

    /// Start a device flow for `scopes`, which are sent as given.
    #[instrument(skip_all)]
    pub async fn start_device_flow(
        &self,
        scopes: &[String],
    ) -> Result<DeviceAuthorization, TokenRequestError> {
        debug!("requesting device code");
        self.client
            .exchange_device_code()
            .add_scopes(scopes.iter().cloned().map(Scope::new))
            .request_async(&self.http)
            .await
    }

    /// Poll the token endpoint until the user completes the device flow, it
    /// is declined, or the device code expires. The poll interval and the
    /// expiry come from `details`.
    #[instrument(skip_all, fields(interval = ?details.interval()))]
    pub async fn poll_device_flow(
        &self,
        details: &DeviceAuthorization,
    ) -> Result<ProviderTokenResponse, DevicePollError> {
        debug!("polling for device flow completion");
        self.client
            .exchange_device_access_token(details)
            .request_async(&self.http, tokio::time::sleep, None)
            .await
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn endpoints_follow_authority() {
        let authority: Url = "https://login.microsoftonline.com/common".parse().unwrap();
        assert_eq!(
            endpoint(&authority, "token"),
            "https://login.microsoftonline.com/common/oauth2/v2.0/token"
        );

        let trailing: Url = "https://login.microsoftonline.com/contoso/".parse().unwrap();
        assert_eq!(
            endpoint(&trailing, "devicecode"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/devicecode"
        );
    }

    #[test]
    fn records_environment() {
        let authority: Url = "https://login.microsoftonline.com/common".parse().unwrap();
        let provider = IdentityProvider::new(&authority, "client").unwrap();
        assert_eq!(provider.environment(), "login.microsoftonline.com");
        assert_eq!(provider.client_id(), "client");
    }

    #[test]
    fn device_message_is_optional() {
        let details: DeviceAuthorization = serde_json::from_value(serde_json::json!({
            "device_code": "dc",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
        }))
        .unwrap();
        assert!(details.extra_fields().message.is_none());
        assert_eq!(details.user_code().secret(), "ABCD-EFGH");
    }
}
