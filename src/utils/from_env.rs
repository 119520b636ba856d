use std::{env::VarError, path::PathBuf, str::FromStr};

/// Derive [`FromEnv`] for a settings struct.
///
/// Each field is one of:
///
/// - an env var, parsed with [`FromEnvVar`]:
///   `#[from_env(var = "NAME", desc = "what it is")]`, plus `optional` for
///   [`Option`] fields so [`FromEnv::check_inventory`] skips them;
/// - a nested struct that implements [`FromEnv`] (no attribute);
/// - `#[from_env(skip)]`, filled with [`Default::default`].
///
/// Structs inside this crate are tagged `#[from_env(crate)]`, see
/// [`RunSettings`].
///
/// ```
/// use graph_devflow::utils::from_env::FromEnv;
///
/// #[derive(Debug, FromEnv)]
/// pub struct Endpoints {
///     #[from_env(var = "LOGIN_HOST", desc = "Identity provider host")]
///     pub login_host: String,
///
///     #[from_env(var = "LOGIN_TIMEOUT", desc = "Timeout in millis", optional)]
///     pub timeout: Option<std::time::Duration>,
/// }
///
/// fn main() {
///     let inventory = Endpoints::inventory();
///     assert_eq!(inventory.len(), 2);
///     assert!(inventory[1].optional);
/// }
/// ```
///
/// The struct must be declared at module level: the generated impl lives in
/// a sibling module that cannot see items declared inside a function.
///
/// [`RunSettings`]: crate::settings::RunSettings
pub use graph_devflow_from_env_derive::FromEnv;

/// One env var read by a [`FromEnv`] type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvItemInfo {
    /// Variable name.
    pub var: &'static str,
    /// What the variable controls.
    pub description: &'static str,
    /// True if the type loads without it.
    pub optional: bool,
}

/// Error loading a value from the environment.
#[derive(Debug, thiserror::Error)]
pub enum FromEnvErr {
    /// The variable is unset or not unicode.
    #[error("error reading variable {0}: {1}")]
    EnvError(String, VarError),
    /// The variable is set to the empty string.
    #[error("environment variable {0} is empty")]
    Empty(String),
    /// The variable is set but its value does not parse.
    #[error("failed to parse environment variable {var}: {source}")]
    ParseError {
        /// Variable name.
        var: String,
        /// Parser error.
        #[source]
        source: Box<dyn core::error::Error + Send + Sync + 'static>,
    },
}

impl FromEnvErr {
    /// The variable could not be read.
    pub fn env_err(var: &str, e: VarError) -> Self {
        Self::EnvError(var.to_owned(), e)
    }

    /// The variable is empty.
    pub fn empty(var: &str) -> Self {
        Self::Empty(var.to_owned())
    }

    /// The variable did not parse.
    pub fn parse_error<E>(var: &str, err: E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        Self::ParseError {
            var: var.to_owned(),
            source: Box::new(err),
        }
    }

    /// True if the variable is absent or empty, rather than malformed.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::EnvError(_, VarError::NotPresent) | Self::Empty(_))
    }
}

/// Read `env_var` and parse it with [`FromStr`]. Empty values are an error.
pub fn parse_env_if_present<T>(env_var: &str) -> Result<T, FromEnvErr>
where
    T: FromStr,
    T::Err: core::error::Error + Send + Sync + 'static,
{
    match std::env::var(env_var) {
        Ok(value) if value.is_empty() => Err(FromEnvErr::empty(env_var)),
        Ok(value) => value
            .parse()
            .map_err(|e| FromEnvErr::parse_error(env_var, e)),
        Err(e) => Err(FromEnvErr::env_err(env_var, e)),
    }
}

/// A settings struct loaded from a fixed set of env vars.
pub trait FromEnv: core::fmt::Debug + Sized + 'static {
    /// Every variable the type reads, optional ones included.
    fn inventory() -> Vec<&'static EnvItemInfo>;

    /// Check that every required variable is set, returning the ones that
    /// are not.
    fn check_inventory() -> Result<(), Vec<&'static EnvItemInfo>> {
        let missing: Vec<_> = Self::inventory()
            .into_iter()
            .filter(|item| !item.optional && std::env::var(item.var).is_err())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    /// Load the type from the environment.
    fn from_env() -> Result<Self, FromEnvErr>;
}

/// A value loaded from a single env var.
///
/// Implemented for integers, [`String`], [`bool`] (set and non-empty),
/// [`PathBuf`], [`url::Url`], [`tracing::Level`], [`std::time::Duration`]
/// (millis), and [`Option`] of any of them, which is [`None`] when the
/// variable is unset or empty.
pub trait FromEnvVar: core::fmt::Debug + Sized + 'static {
    /// Load the value from `env_var`.
    fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr>;
}

impl<T: FromEnvVar> FromEnvVar for Option<T> {
    fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr> {
        match std::env::var(env_var) {
            Ok(value) if !value.is_empty() => T::from_env_var(env_var).map(Some),
            _ => Ok(None),
        }
    }
}

impl FromEnvVar for String {
    fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr> {
        std::env::var(env_var).map_err(|e| FromEnvErr::env_err(env_var, e))
    }
}

impl FromEnvVar for bool {
    fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr> {
        String::from_env_var(env_var).map(|value| !value.is_empty())
    }
}

impl FromEnvVar for std::time::Duration {
    fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr> {
        u64::from_env_var(env_var).map(Self::from_millis)
    }
}

macro_rules! from_str_env_var {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromEnvVar for $t {
                fn from_env_var(env_var: &str) -> Result<Self, FromEnvErr> {
                    parse_env_if_present(env_var)
                }
            }
        )*
    };
}

from_str_env_var!(
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    PathBuf,
    url::Url,
    tracing::Level,
);
