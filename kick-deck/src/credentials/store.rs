//! Credential persistence abstraction.

use async_trait::async_trait;

use super::error::CredentialError;
use super::types::CredentialSet;

#[async_trait]
pub trait CredentialStorage: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Load the stored record; [`CredentialError::MissingCredentials`] when absent.
    async fn load(&self) -> Result<CredentialSet, CredentialError>;

    async fn save(&self, credentials: &CredentialSet) -> Result<(), CredentialError>;

    /// Remove the stored record. Deleting nothing is not an error.
    async fn delete(&self) -> Result<(), CredentialError>;
}

/// Volatile storage, for hosts without persistence and for tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: parking_lot::Mutex<Option<CredentialSet>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(credentials: CredentialSet) -> Self {
        Self {
            record: parking_lot::Mutex::new(Some(credentials)),
        }
    }

    /// Current record without going through the async trait.
    pub fn snapshot(&self) -> Option<CredentialSet> {
        self.record.lock().clone()
    }
}

#[async_trait]
impl CredentialStorage for MemoryCredentialStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self) -> Result<CredentialSet, CredentialError> {
        self.snapshot().ok_or(CredentialError::MissingCredentials)
    }

    async fn save(&self, credentials: &CredentialSet) -> Result<(), CredentialError> {
        *self.record.lock() = Some(credentials.clone());
        Ok(())
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        *self.record.lock() = None;
        Ok(())
    }
}
