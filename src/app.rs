//! One run of the program: load the configuration, get a token, call the
//! Graph API, save the cache.

use crate::{
    auth::{AcquireError, IdentityProvider, ProviderError, TokenAcquirer},
    cache::{CacheError, CacheStore},
    config::{AppConfig, ConfigError},
    graph::{ApiError, GraphClient},
    settings::RunSettings,
};
use std::io::{self, Write};
use tracing::{info, instrument};

/// Everything that can end a run.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Error loading the configuration file.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Error setting up the identity provider client.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Error acquiring a token.
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    /// Error calling the Graph API.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Error saving the token cache.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Error writing the result.
    #[error("failed to write to console: {0}")]
    Io(#[from] io::Error),
    /// Error formatting the result.
    #[error("failed to format Graph API response: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run the program once, writing user-facing output to `console`.
///
/// The token cache is saved on every path out of this function once it has
/// been opened, whether or not a token was acquired.
#[instrument(skip_all, fields(config = %settings.config_path().display()))]
pub async fn run<W: Write>(settings: &RunSettings, console: &mut W) -> Result<(), AppError> {
    let config = AppConfig::load(settings.config_path())?;
    info!(client_id = config.client_id(), "loaded configuration");

    let mut cache = CacheStore::new(settings.cache_path()).open();

    let provider = IdentityProvider::new(settings.authority(), config.client_id())?;
    let token = TokenAcquirer::new(&provider, &mut cache, config.token_scope())
        .acquire(console)
        .await?;

    let profile = GraphClient::new(settings.graph_endpoint().clone())?
        .me(&token)
        .await?;
    writeln!(
        console,
        "Graph API call result: {}",
        serde_json::to_string_pretty(&profile)?
    )?;

    cache.persist()?;
    Ok(())
}
