//! Token manager: cached credentials with single-flight refresh.
//!
//! At most one refresh runs per process. Concurrent callers join the running
//! refresh and receive the same outcome; the in-flight marker is cleared only
//! once that outcome is published, whatever it is.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use kick_api::{AccessTokenProvider, TokenProviderError};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Notify, OnceCell};
use tracing::{debug, error, info, instrument, warn};

use super::endpoint::TokenEndpoint;
use super::error::CredentialError;
use super::store::CredentialStorage;
use super::types::CredentialSet;

type RefreshOutcome = Result<CredentialSet, CredentialError>;

/// Shared state of one running refresh.
struct InFlightRefresh {
    result: OnceCell<RefreshOutcome>,
    notify: Notify,
}

impl InFlightRefresh {
    fn new() -> Self {
        Self {
            result: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    fn set_result(&self, result: RefreshOutcome) {
        let _ = self.result.set(result);
        self.notify.notify_waiters();
    }

    async fn wait(&self) -> RefreshOutcome {
        loop {
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            let notified = self.notify.notified();
            if let Some(result) = self.result.get() {
                return result.clone();
            }

            notified.await;
        }
    }
}

/// Publishes an outcome (abandoned, if none was set) and clears the slot.
///
/// Runs on drop so a cancelled leader cannot strand its waiters.
struct FlightGuard<'a> {
    slot: &'a Mutex<Option<Arc<InFlightRefresh>>>,
    flight: Arc<InFlightRefresh>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.flight.result.get().is_none() {
            self.flight.set_result(Err(CredentialError::Abandoned));
        }
        let mut slot = self.slot.lock();
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &self.flight))
        {
            *slot = None;
        }
    }
}

pub struct TokenManager {
    storage: Arc<dyn CredentialStorage>,
    endpoint: Arc<dyn TokenEndpoint>,
    cache: RwLock<Option<CredentialSet>>,
    /// Serializes storage loads so a cold cache is filled once.
    load_lock: tokio::sync::Mutex<()>,
    in_flight: Mutex<Option<Arc<InFlightRefresh>>>,
    /// Bumped by every invalidation; refreshes started before it are not installed.
    generation: AtomicU64,
}

impl TokenManager {
    pub fn new(storage: Arc<dyn CredentialStorage>, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            storage,
            endpoint,
            cache: RwLock::new(None),
            load_lock: tokio::sync::Mutex::new(()),
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Cached credentials, if loaded.
    pub fn current(&self) -> Option<CredentialSet> {
        self.cache.read().clone()
    }

    /// Whether a refresh is currently running.
    pub fn is_refreshing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Load credentials into the cache if they are not there yet.
    pub async fn ensure_loaded(&self) -> Result<CredentialSet, CredentialError> {
        if let Some(credentials) = self.current() {
            return Ok(credentials);
        }

        let _guard = self.load_lock.lock().await;

        // Double-check after acquiring lock (another task may have loaded)
        if let Some(credentials) = self.current() {
            return Ok(credentials);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let loaded = self.storage.load().await?;
        if self.generation.load(Ordering::SeqCst) == generation {
            *self.cache.write() = Some(loaded.clone());
        }
        debug!(storage = self.storage.name(), "Credentials loaded");
        Ok(loaded)
    }

    /// A valid access token, refreshing first when inside the expiry skew.
    pub async fn access_token(&self) -> Result<String, CredentialError> {
        let credentials = self.ensure_loaded().await?;
        if credentials.tokens.is_due() {
            debug!(expires_at = ?credentials.tokens.expires_at, "Access token due for refresh");
            return Ok(self.refresh().await?.tokens.access_token);
        }
        Ok(credentials.tokens.access_token)
    }

    /// Refresh the token set, joining a refresh that is already running.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (flight, is_leader) = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(existing) => (existing.clone(), false),
                None => {
                    let flight = Arc::new(InFlightRefresh::new());
                    *slot = Some(flight.clone());
                    (flight, true)
                }
            }
        };

        if !is_leader {
            debug!("Joining in-flight token refresh");
            return flight.wait().await;
        }

        let guard = FlightGuard {
            slot: &self.in_flight,
            flight: flight.clone(),
        };
        let outcome = self.perform_refresh().await;
        flight.set_result(outcome.clone());
        drop(guard);
        outcome
    }

    #[instrument(skip(self))]
    async fn perform_refresh(&self) -> RefreshOutcome {
        let generation = self.generation.load(Ordering::SeqCst);
        let current = self.ensure_loaded().await?;

        let Some(refresh_token) = current
            .tokens
            .refresh_token
            .clone()
            .filter(|token| !token.is_empty())
        else {
            error!("Missing refresh_token - cannot refresh");
            return Err(CredentialError::MissingRefreshToken);
        };

        info!("Starting token refresh");
        let response = match self.endpoint.refresh(&current, &refresh_token).await {
            Ok(response) => response,
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Token refresh failed, will retry on next access");
                return Err(e);
            }
            Err(e) => {
                error!(error = %e, relogin = e.requires_relogin(), "Token refresh failed");
                return Err(e);
            }
        };

        let merged = CredentialSet {
            tokens: current.tokens.merge(response, Utc::now().timestamp()),
            ..current
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Credentials invalidated during refresh; not persisting result");
            return Ok(merged);
        }

        if let Err(e) = self.storage.save(&merged).await {
            error!(error = %e, "Failed to persist refreshed credentials");
            return Err(e);
        }

        if self.generation.load(Ordering::SeqCst) == generation {
            *self.cache.write() = Some(merged.clone());
        }

        info!(expires_at = ?merged.tokens.expires_at, "Token refresh successful");
        Ok(merged)
    }

    /// Drop the cached credentials; the next access reloads from storage.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.cache.write() = None;
        debug!("Credential cache invalidated");
    }

    /// Install a record obtained outside the refresh path, such as a host
    /// login, and write it to every storage target.
    ///
    /// The record is cached even when no target accepts it, so the new login
    /// is used for the rest of the session.
    pub async fn adopt(&self, credentials: CredentialSet) -> Result<(), CredentialError> {
        let _guard = self.load_lock.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.cache.write() = Some(credentials.clone());

        let result = self.storage.save(&credentials).await;
        match &result {
            Ok(()) => info!(expires_at = ?credentials.tokens.expires_at, "Adopted new credentials"),
            Err(e) => warn!(error = %e, "Adopted new credentials but could not persist them"),
        }
        result
    }

    /// Delete stored credentials and drop the cache.
    pub async fn logout(&self) -> Result<(), CredentialError> {
        let result = self.storage.delete().await;
        self.invalidate();
        info!("Logged out");
        result
    }
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn access_token(&self) -> Result<String, TokenProviderError> {
        Ok(TokenManager::access_token(self).await?)
    }

    async fn force_refresh(&self) -> Result<String, TokenProviderError> {
        Ok(self.refresh().await?.tokens.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::store::MemoryCredentialStore;
    use crate::credentials::types::TokenResponse;
    use crate::credentials::types::fixtures::credential_set;
    use serde_json::Map;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingEndpoint {
        calls: AtomicUsize,
        delay: Duration,
        fail: bool,
    }

    impl CountingEndpoint {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Duration::from_millis(20))
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenEndpoint for CountingEndpoint {
        async fn refresh(
            &self,
            _credentials: &CredentialSet,
            refresh_token: &str,
        ) -> Result<TokenResponse, CredentialError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(CredentialError::RefreshRejected {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            assert_eq!(refresh_token, "refresh-1");
            Ok(TokenResponse {
                access_token: format!("access-{}", n + 1),
                refresh_token: None,
                expires_in: Some(3600),
                token_type: None,
                scope: None,
                extra: Map::new(),
            })
        }
    }

    fn expired() -> CredentialSet {
        credential_set(Some(Utc::now().timestamp() - 10))
    }

    fn fresh() -> CredentialSet {
        credential_set(Some(Utc::now().timestamp() + 3600))
    }

    fn manager(
        storage: Arc<MemoryCredentialStore>,
        endpoint: Arc<CountingEndpoint>,
    ) -> Arc<TokenManager> {
        Arc::new(TokenManager::new(storage, endpoint))
    }

    #[tokio::test]
    async fn test_fresh_token_is_returned_without_refresh() {
        let endpoint = Arc::new(CountingEndpoint::new(Duration::ZERO));
        let manager = manager(Arc::new(MemoryCredentialStore::with_record(fresh())), endpoint.clone());

        assert_eq!(manager.access_token().await.unwrap(), "access-1");
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_and_persisted() {
        let storage = Arc::new(MemoryCredentialStore::with_record(expired()));
        let endpoint = Arc::new(CountingEndpoint::new(Duration::ZERO));
        let manager = manager(storage.clone(), endpoint.clone());

        assert_eq!(manager.access_token().await.unwrap(), "access-2");
        assert_eq!(endpoint.calls(), 1);

        let persisted = storage.snapshot().unwrap();
        assert_eq!(persisted.tokens.access_token, "access-2");
        assert_eq!(persisted.tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(manager.current().unwrap(), persisted);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_request() {
        let storage = Arc::new(MemoryCredentialStore::with_record(expired()));
        let endpoint = Arc::new(CountingEndpoint::new(Duration::from_millis(50)));
        let manager = manager(storage, endpoint.clone());

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.refresh().await })
            })
            .collect();
        let results = futures::future::join_all(callers).await;

        assert_eq!(endpoint.calls(), 1);
        let first = results[0].as_ref().unwrap().as_ref().unwrap().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap().as_ref().unwrap(), &first);
        }
        assert!(!manager.is_refreshing());

        // Marker cleared: the next refresh goes upstream again.
        manager.refresh().await.unwrap();
        assert_eq!(endpoint.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_shared_and_leaves_cache() {
        let endpoint = Arc::new(CountingEndpoint::failing());
        let manager = manager(Arc::new(MemoryCredentialStore::with_record(expired())), endpoint.clone());
        manager.ensure_loaded().await.unwrap();

        let (a, b, c) = tokio::join!(manager.refresh(), manager.refresh(), manager.refresh());
        for result in [a, b, c] {
            assert!(matches!(
                result,
                Err(CredentialError::RefreshRejected { status: 503, .. })
            ));
        }
        assert_eq!(endpoint.calls(), 1);
        assert_eq!(manager.current().unwrap().tokens.access_token, "access-1");
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let endpoint = Arc::new(CountingEndpoint::new(Duration::ZERO));
        let manager = manager(Arc::new(MemoryCredentialStore::new()), endpoint);

        assert!(matches!(
            manager.access_token().await,
            Err(CredentialError::MissingCredentials)
        ));
        assert!(matches!(
            AccessTokenProvider::access_token(manager.as_ref()).await,
            Err(TokenProviderError::Missing)
        ));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_skips_endpoint() {
        let mut credentials = expired();
        credentials.tokens.refresh_token = None;
        let endpoint = Arc::new(CountingEndpoint::new(Duration::ZERO));
        let manager = manager(Arc::new(MemoryCredentialStore::with_record(credentials)), endpoint.clone());

        assert!(matches!(
            manager.refresh().await,
            Err(CredentialError::MissingRefreshToken)
        ));
        assert_eq!(endpoint.calls(), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_storage_and_cache() {
        let storage = Arc::new(MemoryCredentialStore::with_record(fresh()));
        let manager = manager(storage.clone(), Arc::new(CountingEndpoint::new(Duration::ZERO)));
        manager.ensure_loaded().await.unwrap();

        manager.logout().await.unwrap();
        assert!(manager.current().is_none());
        assert!(storage.snapshot().is_none());
        assert!(matches!(
            manager.access_token().await,
            Err(CredentialError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn test_invalidate_reloads_from_storage() {
        let storage = Arc::new(MemoryCredentialStore::with_record(fresh()));
        let manager = manager(storage.clone(), Arc::new(CountingEndpoint::new(Duration::ZERO)));
        assert_eq!(manager.access_token().await.unwrap(), "access-1");

        let mut relogged = fresh();
        relogged.tokens.access_token = "access-login".to_string();
        storage.save(&relogged).await.unwrap();

        assert_eq!(manager.access_token().await.unwrap(), "access-1");
        manager.invalidate();
        assert_eq!(manager.access_token().await.unwrap(), "access-login");
    }

    #[tokio::test]
    async fn test_adopt_caches_and_persists() {
        let storage = Arc::new(MemoryCredentialStore::with_record(fresh()));
        let endpoint = Arc::new(CountingEndpoint::new(Duration::ZERO));
        let manager = manager(storage.clone(), endpoint.clone());
        assert_eq!(manager.access_token().await.unwrap(), "access-1");

        let mut login = fresh();
        login.tokens.access_token = "access-login".to_string();
        manager.adopt(login.clone()).await.unwrap();

        assert_eq!(manager.current().unwrap(), login);
        assert_eq!(storage.snapshot().unwrap(), login);
        assert_eq!(manager.access_token().await.unwrap(), "access-login");
        assert_eq!(endpoint.calls(), 0);
    }
}
