//! Live status resolution for Kick channels.
//!
//! [`StatusResolver`] turns a channel slug into a [`ChannelStatus`] using the
//! authorized public API, with a cached web lookup filling in display names
//! and avatars the API leaves out. Tokens come from an
//! [`AccessTokenProvider`] supplied by the caller.

pub mod auth;
pub mod client;
pub mod error;
mod models;
pub mod profile;
pub mod resolver;
pub mod status;

pub use auth::{AccessTokenProvider, StaticToken};
pub use error::{StatusError, TokenProviderError};
pub use models::LIVE_MARKER;
pub use profile::{ProfileLookup, WebProfile};
pub use resolver::{ResolverConfig, StatusResolver, StatusSource};
pub use status::{ChannelStatus, Lookup, normalize_slug};
