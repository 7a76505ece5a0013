//! Newline-delimited JSON protocol spoken with the host.
//!
//! Events arrive one JSON object per line, tagged by `event`. Commands go
//! back the same way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::credentials::CredentialError;

use super::surface::{AuthFlow, BrowserOpener, ButtonSurface};

/// Per-button settings as stored by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSettings {
    /// Comma-joined channel slugs.
    #[serde(default, alias = "channel")]
    pub channels: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SettingsPayload {
    #[serde(default)]
    pub settings: ButtonSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    Login,
    Logout,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ActionPayload {
    #[serde(default)]
    pub action: String,
}

impl ActionPayload {
    pub fn kind(&self) -> PluginAction {
        match self.action.as_str() {
            "login" => PluginAction::Login,
            "logout" => PluginAction::Logout,
            _ => PluginAction::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GlobalSettingsPayload {
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    WillAppear {
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    WillDisappear {
        context: String,
    },
    DidReceiveSettings {
        context: String,
        #[serde(default)]
        payload: SettingsPayload,
    },
    KeyDown {
        context: String,
    },
    KeyUp {
        context: String,
    },
    SendToPlugin {
        #[serde(default)]
        context: Option<String>,
        payload: ActionPayload,
    },
    DidReceiveGlobalSettings {
        #[serde(default)]
        payload: GlobalSettingsPayload,
    },
    #[serde(other)]
    Unknown,
}

impl HostEvent {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitlePayload {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImagePayload {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlPayload {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostCommand {
    SetTitle {
        context: String,
        payload: TitlePayload,
    },
    SetImage {
        context: String,
        payload: ImagePayload,
    },
    OpenUrl {
        payload: UrlPayload,
    },
    SetGlobalSettings {
        payload: Value,
    },
    StartAuthFlow,
}

impl HostCommand {
    pub fn set_title(context: &str, title: &str) -> Self {
        Self::SetTitle {
            context: context.to_string(),
            payload: TitlePayload {
                title: title.to_string(),
            },
        }
    }

    pub fn set_image(context: &str, image: &str) -> Self {
        Self::SetImage {
            context: context.to_string(),
            payload: ImagePayload {
                image: image.to_string(),
            },
        }
    }

    pub fn open_url(url: &str) -> Self {
        Self::OpenUrl {
            payload: UrlPayload {
                url: url.to_string(),
            },
        }
    }

    pub fn set_global_settings(settings: Value) -> Self {
        Self::SetGlobalSettings { payload: settings }
    }
}

/// Queue of commands bound for the host writer.
#[derive(Debug, Clone)]
pub struct CommandSink {
    tx: mpsc::UnboundedSender<HostCommand>,
}

impl CommandSink {
    pub fn new(tx: mpsc::UnboundedSender<HostCommand>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(
        &self,
        command: HostCommand,
    ) -> Result<(), mpsc::error::SendError<HostCommand>> {
        self.tx.send(command)
    }

    fn send_or_log(&self, command: HostCommand) {
        if self.tx.send(command).is_err() {
            debug!("Host writer closed; dropping command");
        }
    }
}

impl ButtonSurface for CommandSink {
    fn set_title(&self, context: &str, title: &str) {
        self.send_or_log(HostCommand::set_title(context, title));
    }

    fn set_image(&self, context: &str, image: &str) {
        self.send_or_log(HostCommand::set_image(context, image));
    }
}

impl BrowserOpener for CommandSink {
    fn open(&self, url: &str) {
        self.send_or_log(HostCommand::open_url(url));
    }
}

/// Hands the OAuth flow to the host, which writes the resulting record into
/// the shared storage before the login action completes.
#[async_trait]
impl AuthFlow for CommandSink {
    async fn start(&self) -> Result<(), CredentialError> {
        self.send(HostCommand::StartAuthFlow)
            .map_err(|e| CredentialError::AuthFlow(e.to_string()))
    }
}

/// Serialize queued commands to `writer`, one JSON object per line.
///
/// Returns once every [`CommandSink`] has been dropped.
pub async fn write_commands<W>(
    mut rx: mpsc::UnboundedReceiver<HostCommand>,
    mut writer: W,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let mut line = match serde_json::to_vec(&command) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to serialize host command");
                continue;
            }
        };
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }
    Ok(())
}
