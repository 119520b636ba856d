//! Loading the YAML configuration file.
//!
//! The file must name the application (`client_id`) and the permissions it
//! asks for (`token_scope`). Nothing is defaulted.

use serde::Deserialize;
use std::{
    io,
    path::{Path, PathBuf},
};
use tracing::debug;

const CLIENT_ID: &str = "client_id";
const TOKEN_SCOPE: &str = "token_scope";

/// Possible errors when loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("could not find '{}'", path.display())]
    MissingFile {
        /// The path that was checked.
        path: PathBuf,
    },
    /// A required key is absent (or empty).
    #[error("'{}' must contain a '{key}' key", path.display())]
    MissingKey {
        /// The missing key.
        key: &'static str,
        /// The file that was read.
        path: PathBuf,
    },
    /// The file exists but could not be read.
    #[error("failed to read configuration file: {0}")]
    Read(#[from] io::Error),
    /// The file is not valid YAML, or a key has the wrong type.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    client_id: Option<String>,
    token_scope: Option<Vec<String>>,
}

/// The application registration and scopes used to request tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    client_id: String,
    token_scope: Vec<String>,
}

impl AppConfig {
    /// Create a new config.
    pub fn new(client_id: impl Into<String>, token_scope: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            token_scope,
        }
    }

    /// Load the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingFile {
                    path: path.to_owned(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let config = Self::from_yaml(&contents, path)?;
        debug!(
            path = %path.display(),
            client_id = %config.client_id,
            scopes = config.token_scope.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parse the configuration from YAML text. `path` is used only for error
    /// messages.
    pub fn from_yaml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let raw: Option<RawConfig> = if contents.trim().is_empty() {
            None
        } else {
            serde_yaml::from_str(contents)?
        };
        let raw = raw.unwrap_or_default();

        let missing = |key| ConfigError::MissingKey {
            key,
            path: path.to_owned(),
        };

        let client_id = raw
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| missing(CLIENT_ID))?;
        let token_scope = raw
            .token_scope
            .filter(|scopes| !scopes.is_empty())
            .ok_or_else(|| missing(TOKEN_SCOPE))?;

        Ok(Self {
            client_id,
            token_scope,
        })
    }

    /// Get the application (client) identifier.
    #[allow(clippy::missing_const_for_fn)] // false positive, non-const deref
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Get the requested scopes, in file order.
    #[allow(clippy::missing_const_for_fn)] // false positive, non-const deref
    pub fn token_scope(&self) -> &[String] {
        &self.token_scope
    }
}
