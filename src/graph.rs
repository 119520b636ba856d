use oauth2::AccessToken;
use tracing::{debug, instrument, warn};
use url::Url;

/// Possible errors when calling the Graph API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    /// The request failed, returned a non-success status, or the body was
    /// not JSON.
    #[error("Graph API call failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// A client for the Graph `me` endpoint.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl GraphClient {
    /// Create a client that calls `endpoint`.
    pub fn new(endpoint: Url) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self { client, endpoint })
    }

    /// Fetch the signed-in user's profile.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn me(&self, token: &AccessToken) -> Result<serde_json::Value, ApiError> {
        let profile = self
            .client
            .get(self.endpoint.clone())
            .bearer_auth(token.secret())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .inspect_err(|e| warn!(%e, "Graph API request failed"))?
            .json::<serde_json::Value>()
            .await?;

        debug!("received Graph API response");
        Ok(profile)
    }
}
