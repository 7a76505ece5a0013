//! Host global settings access.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use super::protocol::{CommandSink, HostCommand};

#[derive(Debug, Clone, Error)]
#[error("host error: {0}")]
pub struct HostError(pub String);

/// Whole-object access to the host's global settings.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    async fn get_global_settings(&self) -> Result<Value, HostError>;
    async fn set_global_settings(&self, settings: Value) -> Result<(), HostError>;
}

/// Settings held in process memory.
///
/// When built with [`InMemorySettings::mirrored`], every write is also pushed
/// to the host as a `setGlobalSettings` command, and the host's
/// `didReceiveGlobalSettings` events update the local copy via
/// [`InMemorySettings::replace`].
#[derive(Default)]
pub struct InMemorySettings {
    value: Mutex<Value>,
    sink: Option<CommandSink>,
}

impl InMemorySettings {
    pub fn new(value: Value) -> Self {
        Self {
            value: Mutex::new(value),
            sink: None,
        }
    }

    pub fn mirrored(value: Value, sink: CommandSink) -> Self {
        Self {
            value: Mutex::new(value),
            sink: Some(sink),
        }
    }

    /// Adopt settings pushed by the host.
    pub fn replace(&self, value: Value) {
        *self.value.lock() = value;
    }

    pub fn snapshot(&self) -> Value {
        self.value.lock().clone()
    }
}

#[async_trait]
impl SettingsBackend for InMemorySettings {
    async fn get_global_settings(&self) -> Result<Value, HostError> {
        Ok(self.snapshot())
    }

    async fn set_global_settings(&self, settings: Value) -> Result<(), HostError> {
        *self.value.lock() = settings.clone();
        if let Some(sink) = &self.sink {
            sink.send(HostCommand::set_global_settings(settings))
                .map_err(|e| HostError(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_mirrored_write_is_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let settings = InMemorySettings::mirrored(Value::Null, CommandSink::new(tx));

        settings
            .set_global_settings(json!({ "kickCredentials": null }))
            .await
            .unwrap();

        assert_eq!(
            settings.get_global_settings().await.unwrap(),
            json!({ "kickCredentials": null })
        );
        let command = rx.recv().await.unwrap();
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({ "event": "setGlobalSettings", "payload": { "kickCredentials": null } })
        );
    }

    #[tokio::test]
    async fn test_closed_sink_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let settings = InMemorySettings::mirrored(Value::Null, CommandSink::new(tx));
        assert!(settings.set_global_settings(json!({})).await.is_err());
    }
}
