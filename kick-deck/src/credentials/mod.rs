//! OAuth credential management.
//!
//! # Architecture
//!
//! - [`CredentialSet`]: Persisted OAuth record (server metadata, client, tokens)
//! - [`CredentialStorage`]: Persistence seam with file, host settings and fallback backends
//! - [`TokenEndpoint`]: Upstream refresh call
//! - [`TokenManager`]: Cached access tokens with single-flight refresh

mod backend;
mod endpoint;
mod error;
mod fallback;
mod file_store;
mod manager;
mod settings_store;
mod store;
mod types;

pub use backend::{BackendTargets, StorageKind, select_backend, selected_backend};
pub use endpoint::{HttpTokenEndpoint, TokenEndpoint};
pub use error::CredentialError;
pub use fallback::FallbackCredentialStore;
pub use file_store::FileCredentialStore;
pub use manager::TokenManager;
pub use settings_store::{HostSettingsStore, SETTINGS_KEY};
pub use store::{CredentialStorage, MemoryCredentialStore};
pub use types::{
    CredentialSet, DEFAULT_EXPIRES_IN_SECS, EXPIRY_SKEW_SECS, ServerMetadata, TokenResponse,
    TokenSet,
};

#[cfg(test)]
pub(crate) use types::fixtures;
