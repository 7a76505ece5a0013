//! Button actor: one task per button instance.
//!
//! The actor owns its [`ChannelMonitor`] and multiplexes host messages with
//! the monitor's own poll and alert timers, so every state change of an
//! instance happens on a single task.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::button::ChannelMonitor;

/// Default mailbox capacity per button.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// New comma-joined channel setting.
    Configure(String),
    KeyDown,
    KeyUp,
    /// Poll now, outside the regular cadence.
    Refresh,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorOutcome {
    /// Stopped by message or because every handle was dropped.
    Stopped,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The actor has stopped and is no longer accepting messages.
    ActorStopped,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::ActorStopped => write!(f, "Actor has stopped"),
        }
    }
}

impl std::error::Error for SendError {}

/// Cheap, cloneable handle to a running [`ButtonActor`].
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    id: String,
    sender: mpsc::Sender<MonitorMessage>,
    cancellation_token: CancellationToken,
}

impl MonitorHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn send(&self, message: MonitorMessage) -> Result<(), SendError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| SendError::ActorStopped)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }
}

pub struct ButtonActor {
    monitor: ChannelMonitor,
    mailbox: mpsc::Receiver<MonitorMessage>,
    cancellation_token: CancellationToken,
}

impl ButtonActor {
    /// Create an actor and the handle that talks to it.
    pub fn new(
        monitor: ChannelMonitor,
        cancellation_token: CancellationToken,
    ) -> (Self, MonitorHandle) {
        let (sender, mailbox) = mpsc::channel(DEFAULT_MAILBOX_CAPACITY);
        let handle = MonitorHandle {
            id: monitor.context().to_string(),
            sender,
            cancellation_token: cancellation_token.clone(),
        };
        let actor = Self {
            monitor,
            mailbox,
            cancellation_token,
        };
        (actor, handle)
    }

    pub fn id(&self) -> &str {
        self.monitor.context()
    }

    pub async fn run(mut self) -> ActorOutcome {
        debug!(instance = %self.id(), "Button actor started");

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    break ActorOutcome::Cancelled;
                }

                message = self.mailbox.recv() => {
                    let Some(message) = message else {
                        break ActorOutcome::Stopped;
                    };
                    if self.handle_message(message).await {
                        break ActorOutcome::Stopped;
                    }
                }

                event = self.monitor.next_timer() => {
                    self.monitor.on_timer(event).await;
                }
            }
        };

        self.monitor.stop();
        info!(instance = %self.id(), ?outcome, "Button actor finished");
        outcome
    }

    /// Returns `true` when the actor should stop.
    async fn handle_message(&mut self, message: MonitorMessage) -> bool {
        match message {
            MonitorMessage::Configure(channels) => self.monitor.configure(&channels).await,
            MonitorMessage::KeyDown => debug!(instance = %self.id(), "Key down"),
            MonitorMessage::KeyUp => {
                // Openings run on their own task so timers keep firing.
                let _ = self.monitor.key_up();
            }
            MonitorMessage::Refresh => self.monitor.refresh().await,
            MonitorMessage::Stop => return true,
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::button::MonitorConfig;
    use crate::monitor::testing::harness;

    #[tokio::test]
    async fn test_actor_applies_messages_in_order() {
        let h = harness();
        h.source.set("xqc", "xQc", false);
        let monitor = ChannelMonitor::new("btn", MonitorConfig::default(), h.services.clone());
        let (actor, handle) = ButtonActor::new(monitor, CancellationToken::new());
        let task = tokio::spawn(actor.run());

        handle
            .send(MonitorMessage::Configure("xqc".into()))
            .await
            .unwrap();
        handle.send(MonitorMessage::Refresh).await.unwrap();
        handle.send(MonitorMessage::Stop).await.unwrap();

        assert_eq!(task.await.unwrap(), ActorOutcome::Stopped);
        assert_eq!(h.source.calls(), 2);
        assert_eq!(h.surface.last_title().as_deref(), Some("xQc\nOFFLINE"));
        assert!(handle.send(MonitorMessage::Refresh).await.is_err());
    }

    #[tokio::test]
    async fn test_cancellation_stops_actor() {
        let h = harness();
        let monitor = ChannelMonitor::new("btn", MonitorConfig::default(), h.services.clone());
        let token = CancellationToken::new();
        let (actor, handle) = ButtonActor::new(monitor, token.child_token());
        let task = tokio::spawn(actor.run());

        token.cancel();
        assert_eq!(task.await.unwrap(), ActorOutcome::Cancelled);
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_polls_on_its_own() {
        let h = harness();
        h.source.set("xqc", "xQc", false);
        let monitor = ChannelMonitor::new("btn", MonitorConfig::default(), h.services.clone());
        let (actor, handle) = ButtonActor::new(monitor, CancellationToken::new());
        let task = tokio::spawn(actor.run());

        handle
            .send(MonitorMessage::Configure("xqc".into()))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(125)).await;
        handle.send(MonitorMessage::Stop).await.unwrap();
        task.await.unwrap();

        assert_eq!(h.source.calls(), 3);
    }
}
