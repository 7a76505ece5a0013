//! Credential storage inside the host's global settings object.
//!
//! The host only offers whole-object get/set, so every operation is a
//! read-modify-write. A FIFO mutex serializes load, save and delete so that
//! concurrent callers cannot interleave and drop each other's writes.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::host::SettingsBackend;

use super::error::CredentialError;
use super::store::CredentialStorage;
use super::types::CredentialSet;

/// Key of the credential record inside the global settings object.
pub const SETTINGS_KEY: &str = "kickCredentials";

pub struct HostSettingsStore {
    backend: Arc<dyn SettingsBackend>,
    lock: Mutex<()>,
}

impl HostSettingsStore {
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    async fn read_object(&self) -> Result<Map<String, Value>, CredentialError> {
        match self.backend.get_global_settings().await? {
            Value::Object(map) => Ok(map),
            // The host hands out null (or garbage) before anything was saved.
            _ => Ok(Map::new()),
        }
    }
}

#[async_trait]
impl CredentialStorage for HostSettingsStore {
    fn name(&self) -> &'static str {
        "host-settings"
    }

    async fn load(&self) -> Result<CredentialSet, CredentialError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read_object().await?;
        match settings.remove(SETTINGS_KEY) {
            None | Some(Value::Null) => Err(CredentialError::MissingCredentials),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    async fn save(&self, credentials: &CredentialSet) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read_object().await?;
        settings.insert(SETTINGS_KEY.to_string(), serde_json::to_value(credentials)?);
        self.backend
            .set_global_settings(Value::Object(settings))
            .await?;
        Ok(())
    }

    async fn delete(&self) -> Result<(), CredentialError> {
        let _guard = self.lock.lock().await;
        let mut settings = self.read_object().await?;
        if settings.remove(SETTINGS_KEY).is_some() {
            self.backend
                .set_global_settings(Value::Object(settings))
                .await?;
        }
        Ok(())
    }
}
