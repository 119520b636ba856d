use crate::utils::from_env::FromEnv;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};
use url::Url;

/// Configuration file read when `DEVFLOW_CONFIG_PATH` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Token cache file used when `DEVFLOW_CACHE_PATH` is unset.
pub const DEFAULT_CACHE_PATH: &str = "cache.bin";

/// The multi-tenant Microsoft identity platform authority.
pub static DEFAULT_AUTHORITY: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://login.microsoftonline.com/common").expect("valid authority url")
});

/// The Graph profile endpoint for the signed-in user.
pub static DEFAULT_GRAPH_ENDPOINT: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://graph.microsoft.com/v1.0/me").expect("valid graph url")
});

/// File locations and endpoints for a run.
///
/// None of these are required. They exist so the files can be moved, and so
/// a test harness can point the program at a mock identity provider. What the
/// program does is still decided by the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromEnv)]
#[from_env(crate)]
pub struct RunSettings {
    #[from_env(
        var = "DEVFLOW_CONFIG_PATH",
        desc = "Path to the YAML configuration file. Defaults to `config.yaml`",
        optional
    )]
    config_path: Option<PathBuf>,

    #[from_env(
        var = "DEVFLOW_CACHE_PATH",
        desc = "Path to the token cache file. Defaults to `cache.bin`",
        optional
    )]
    cache_path: Option<PathBuf>,

    #[from_env(
        var = "DEVFLOW_AUTHORITY",
        desc = "OAuth authority URL. Defaults to https://login.microsoftonline.com/common",
        optional
    )]
    authority: Option<Url>,

    #[from_env(
        var = "DEVFLOW_GRAPH_ENDPOINT",
        desc = "URL fetched with the acquired token. Defaults to https://graph.microsoft.com/v1.0/me",
        optional
    )]
    graph_endpoint: Option<Url>,
}

impl RunSettings {
    /// Override the configuration file path.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Override the token cache path.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Override the authority.
    pub fn with_authority(mut self, authority: Url) -> Self {
        self.authority = Some(authority);
        self
    }

    /// Override the Graph endpoint.
    pub fn with_graph_endpoint(mut self, endpoint: Url) -> Self {
        self.graph_endpoint = Some(endpoint);
        self
    }

    /// Get the configuration file path.
    pub fn config_path(&self) -> &Path {
        self.config_path
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Get the token cache path.
    pub fn cache_path(&self) -> &Path {
        self.cache_path
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_CACHE_PATH))
    }

    /// Get the authority URL.
    pub fn authority(&self) -> &Url {
        self.authority.as_ref().unwrap_or(&*DEFAULT_AUTHORITY)
    }

    /// Get the Graph endpoint.
    pub fn graph_endpoint(&self) -> &Url {
        self.graph_endpoint
            .as_ref()
            .unwrap_or(&*DEFAULT_GRAPH_ENDPOINT)
    }
}
