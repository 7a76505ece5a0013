//! Process-wide storage backend selection.
//!
//! The backend is chosen once at startup and handed to the token manager as
//! an explicit dependency. Asking for a different backend later in the same
//! process fails instead of silently swapping storage underneath live tokens.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use crate::host::SettingsBackend;

use super::error::CredentialError;
use super::fallback::FallbackCredentialStore;
use super::file_store::FileCredentialStore;
use super::settings_store::HostSettingsStore;
use super::store::CredentialStorage;

static SELECTED_BACKEND: OnceLock<StorageKind> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// JSON file on disk.
    File,
    /// Host global settings.
    HostSettings,
    /// File first, host settings as fallback.
    Both,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::File => "file",
            StorageKind::HostSettings => "settings",
            StorageKind::Both => "both",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageKind::File),
            "settings" | "host" | "host-settings" => Ok(StorageKind::HostSettings),
            "both" => Ok(StorageKind::Both),
            other => Err(format!("unknown storage backend {other:?}")),
        }
    }
}

/// Inputs needed to construct any backend.
pub struct BackendTargets {
    pub file_path: PathBuf,
    pub settings: Arc<dyn SettingsBackend>,
}

/// Select the process-wide backend and build it.
pub fn select_backend(
    kind: StorageKind,
    targets: BackendTargets,
) -> Result<Arc<dyn CredentialStorage>, CredentialError> {
    claim(&SELECTED_BACKEND, kind)?;
    Ok(build_backend(kind, targets))
}

/// The backend selected so far, if any.
pub fn selected_backend() -> Option<StorageKind> {
    SELECTED_BACKEND.get().copied()
}

fn claim(slot: &OnceLock<StorageKind>, kind: StorageKind) -> Result<(), CredentialError> {
    let current = *slot.get_or_init(|| kind);
    if current == kind {
        Ok(())
    } else {
        Err(CredentialError::ConflictingBackend {
            current: current.as_str(),
            requested: kind.as_str(),
        })
    }
}

fn build_backend(kind: StorageKind, targets: BackendTargets) -> Arc<dyn CredentialStorage> {
    match kind {
        StorageKind::File => Arc::new(FileCredentialStore::new(targets.file_path)),
        StorageKind::HostSettings => Arc::new(HostSettingsStore::new(targets.settings)),
        StorageKind::Both => Arc::new(FallbackCredentialStore::new(vec![
            Arc::new(FileCredentialStore::new(targets.file_path)),
            Arc::new(HostSettingsStore::new(targets.settings)),
        ])),
    }
}
