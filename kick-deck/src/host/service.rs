//! Dispatch of host events to monitors and plugin actions.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialError, CredentialSet, SETTINGS_KEY, TokenManager};
use crate::monitor::MonitorRegistry;

use super::protocol::{HostEvent, PluginAction};
use super::settings::InMemorySettings;
use super::surface::AuthFlow;

pub struct PluginService {
    registry: Arc<MonitorRegistry>,
    tokens: Arc<TokenManager>,
    auth_flow: Arc<dyn AuthFlow>,
    settings: Option<Arc<InMemorySettings>>,
}

impl PluginService {
    pub fn new(
        registry: Arc<MonitorRegistry>,
        tokens: Arc<TokenManager>,
        auth_flow: Arc<dyn AuthFlow>,
    ) -> Self {
        Self {
            registry,
            tokens,
            auth_flow,
            settings: None,
        }
    }

    /// Keep `settings` in sync with `didReceiveGlobalSettings` events.
    pub fn with_settings(mut self, settings: Arc<InMemorySettings>) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    /// Parse and handle one protocol line. Malformed lines are logged and skipped.
    pub async fn handle_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match HostEvent::parse(line) {
            Ok(event) => self.handle_event(event).await,
            Err(e) => warn!(error = %e, "Ignoring malformed host event"),
        }
    }

    pub async fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::WillAppear { context, payload }
            | HostEvent::DidReceiveSettings { context, payload } => {
                self.registry
                    .configure(&context, &payload.settings.channels)
                    .await;
            }
            HostEvent::WillDisappear { context } => {
                self.registry.remove(&context);
            }
            HostEvent::KeyDown { context } => self.registry.key_down(&context).await,
            HostEvent::KeyUp { context } => self.registry.key_up(&context).await,
            HostEvent::SendToPlugin { payload, .. } => {
                let result = match payload.kind() {
                    PluginAction::Login => self.login().await,
                    PluginAction::Logout => self.logout().await,
                    PluginAction::Unknown => {
                        debug!(action = %payload.action, "Ignoring unknown plugin action");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    warn!(action = %payload.action, error = %e, "Plugin action failed");
                }
            }
            HostEvent::DidReceiveGlobalSettings { payload } => {
                self.adopt_global_settings(payload.settings).await;
            }
            HostEvent::Unknown => debug!("Ignoring unhandled host event"),
        }
    }

    /// Run the external login flow and start over with fresh credentials.
    pub async fn login(&self) -> Result<(), CredentialError> {
        info!("Starting login");
        self.auth_flow.start().await?;
        self.tokens.invalidate();
        self.registry.refresh_all().await;
        Ok(())
    }

    /// Forget stored credentials.
    pub async fn logout(&self) -> Result<(), CredentialError> {
        self.tokens.logout().await?;
        self.registry.refresh_all().await;
        Ok(())
    }

    async fn adopt_global_settings(&self, settings: Value) {
        let Some(local) = &self.settings else {
            return;
        };

        let record = settings.get(SETTINGS_KEY).cloned();
        let changed = local.snapshot().get(SETTINGS_KEY) != record.as_ref();
        local.replace(settings);

        if !changed {
            return;
        }

        debug!("Stored credentials changed on the host");
        match record {
            None | Some(Value::Null) => {
                if let Err(e) = self.tokens.logout().await {
                    warn!(error = %e, "Failed to clear credentials removed on the host");
                }
            }
            Some(value) => match serde_json::from_value::<CredentialSet>(value) {
                // Other targets may hold an older record that would shadow this one.
                Ok(credentials) => {
                    if let Err(e) = self.tokens.adopt(credentials).await {
                        warn!(error = %e, "Failed to store credentials from the host");
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring unreadable credentials from the host");
                    self.tokens.invalidate();
                }
            },
        }
        self.registry.refresh_all().await;
    }
}
