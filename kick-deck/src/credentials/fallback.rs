//! Best-effort storage across several persistence targets.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::error::CredentialError;
use super::store::CredentialStorage;
use super::types::CredentialSet;

/// Ordered chain of storage targets.
///
/// Loads return the first target that has a record. Saves succeed when at
/// least one target accepts the write. Deletes go to every target.
pub struct FallbackCredentialStore {
    targets: Vec<Arc<dyn CredentialStorage>>,
}

impl FallbackCredentialStore {
    pub fn new(targets: Vec<Arc<dyn CredentialStorage>>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl CredentialStorage for FallbackCredentialStore {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn load(&self) -> Result<CredentialSet, CredentialError> {
        let mut last_error = None;
        for target in &self.targets {
            match target.load().await {
                Ok(credentials) => {
                    debug!(target = target.name(), "Loaded credentials");
                    return Ok(credentials);
                }
                Err(CredentialError::MissingCredentials) => {}
                Err(e) => {
                    warn!(target = target.name(), error = %e, "Failed to load credentials");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or(CredentialError::MissingCredentials))
    }

    async fn save(&self, credentials: &CredentialSet) -> Result<(), CredentialError> {
        let mut failures = Vec::new();
        let mut saved = 0usize;
        for target in &self.targets {
            match target.save(credentials).await {
                Ok(()) => saved += 1,
                Err(e) => {
                    warn!(target = target.name(), error = %e, "Failed to save credentials");
                    failures.push(format!("{}: {}", target.name(), e));
                }
            }
        }

        if saved > 0 {
            Ok(())
        } else if failures.is_empty() {
            Err(CredentialError::Storage(
                "no storage targets configured".to_string(),
            ))
        } else {
            Err(CredentialError::Storage(failures.join("; ")))
        }
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        let mut first_error = None;
        for target in &self.targets {
            if let Err(e) = target.delete().await {
                warn!(target = target.name(), error = %e, "Failed to delete credentials");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::types::fixtures::credential_set;
    use crate::credentials::store::MemoryCredentialStore;

    struct BrokenStore;

    #[async_trait]
    impl CredentialStorage for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn load(&self) -> Result<CredentialSet, CredentialError> {
            Err(CredentialError::Storage("unreadable".into()))
        }

        async fn save(&self, _credentials: &CredentialSet) -> Result<(), CredentialError> {
            Err(CredentialError::Storage("read-only".into()))
        }

        async fn delete(&self) -> Result<(), CredentialError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_save_succeeds_if_any_target_accepts() {
        let good = Arc::new(MemoryCredentialStore::new());
        let targets: Vec<Arc<dyn CredentialStorage>> = vec![Arc::new(BrokenStore), good.clone()];
        let store = FallbackCredentialStore::new(targets);

        store.save(&credential_set(Some(5))).await.unwrap();
        assert!(good.snapshot().is_some());
        assert_eq!(store.load().await.unwrap(), credential_set(Some(5)));
    }

    #[tokio::test]
    async fn test_save_fails_if_all_targets_fail() {
        let targets: Vec<Arc<dyn CredentialStorage>> =
            vec![Arc::new(BrokenStore), Arc::new(BrokenStore)];
        let store = FallbackCredentialStore::new(targets);

        let err = store.save(&credential_set(None)).await.unwrap_err();
        assert!(matches!(err, CredentialError::Storage(ref msg) if msg.contains("read-only")));
    }

    #[tokio::test]
    async fn test_load_prefers_first_target_with_a_record() {
        let first = Arc::new(MemoryCredentialStore::new());
        let second = Arc::new(MemoryCredentialStore::new());
        second.save(&credential_set(Some(2))).await.unwrap();

        let targets: Vec<Arc<dyn CredentialStorage>> = vec![first.clone(), second];
        let store = FallbackCredentialStore::new(targets);
        assert_eq!(store.load().await.unwrap(), credential_set(Some(2)));

        first.save(&credential_set(Some(1))).await.unwrap();
        assert_eq!(store.load().await.unwrap(), credential_set(Some(1)));
    }

    #[tokio::test]
    async fn test_empty_everywhere_is_missing() {
        let targets: Vec<Arc<dyn CredentialStorage>> = vec![Arc::new(MemoryCredentialStore::new())];
        let store = FallbackCredentialStore::new(targets);
        assert!(matches!(
            store.load().await,
            Err(CredentialError::MissingCredentials)
        ));
    }
}
