//! Sign in to the Microsoft identity platform with the OAuth2 device
//! authorization grant, keep the resulting tokens in a file-backed cache,
//! and call the Graph `me` endpoint with the access token.
//!
//! A run goes through [`app::run`]:
//!
//! - [`config`] reads the application id and scopes from a YAML file.
//! - [`cache`] loads the token cache and saves it again on every exit path.
//! - [`auth`] returns a cached or refreshed token when it can, and otherwise
//!   runs the device flow.
//! - [`graph`] fetches the user's profile.
//!
//! File locations and endpoints can be overridden from the environment, see
//! [`settings::RunSettings`]. Tracing is installed with
//! [`utils::tracing::init_tracing`].

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod app;

pub mod auth;

pub mod cache;

pub mod config;

/// Calling the Graph API with an acquired token.
pub mod graph;

/// Normalised OAuth2 scope sets.
pub mod scopes;

/// File locations and endpoints, overridable from the environment.
pub mod settings;

/// Utilities shared with the binary: env loading and tracing.
pub mod utils;

/// Re-exports of common dependencies.
pub mod deps {
    pub use tracing;
    pub use tracing_subscriber;
}

// Used by the binary only.
use eyre as _;
