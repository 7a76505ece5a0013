//! Registry of button actors keyed by instance id.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::actor::{ActorOutcome, ButtonActor, MonitorHandle, MonitorMessage};
use super::button::{ChannelMonitor, MonitorConfig, MonitorServices};

type ActorTasks = JoinSet<(String, ActorOutcome)>;

/// Collect actors that already finished so their slots do not pile up.
fn reap_finished(tasks: &mut ActorTasks) {
    while let Some(result) = tasks.try_join_next() {
        match result {
            Ok((id, outcome)) => debug!(instance = %id, ?outcome, "Button actor reaped"),
            Err(e) => warn!(error = %e, "Button actor task failed"),
        }
    }
}

/// Spawns a button actor on the first event for an instance and stops it
/// when the instance disappears.
pub struct MonitorRegistry {
    actors: DashMap<String, MonitorHandle>,
    tasks: Mutex<ActorTasks>,
    config: MonitorConfig,
    services: MonitorServices,
    /// Parent cancellation token.
    cancellation_token: CancellationToken,
}

impl MonitorRegistry {
    pub fn new(
        config: MonitorConfig,
        services: MonitorServices,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            actors: DashMap::new(),
            tasks: Mutex::new(JoinSet::new()),
            config,
            services,
            cancellation_token,
        }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn contains(&self, context: &str) -> bool {
        self.actors.contains_key(context)
    }

    /// Actor tasks not yet joined, after reaping the finished ones.
    pub fn task_count(&self) -> usize {
        let mut tasks = self.tasks.lock();
        reap_finished(&mut tasks);
        tasks.len()
    }

    fn spawn(&self, context: &str) -> MonitorHandle {
        info!(instance = %context, "Spawning button actor");
        let monitor = ChannelMonitor::new(context, self.config.clone(), self.services.clone());
        let (actor, handle) = ButtonActor::new(monitor, self.cancellation_token.child_token());
        let id = context.to_string();
        let mut tasks = self.tasks.lock();
        reap_finished(&mut tasks);
        tasks.spawn(async move {
            let outcome = actor.run().await;
            (id, outcome)
        });
        handle
    }

    /// Handle for `context`, spawning an actor if none is running.
    pub fn handle(&self, context: &str) -> MonitorHandle {
        match self.actors.entry(context.to_string()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                debug!(instance = %context, "Replacing stopped button actor");
                let handle = self.spawn(context);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => {
                let handle = self.spawn(context);
                entry.insert(handle.clone());
                handle
            }
        }
    }

    async fn send(&self, context: &str, message: MonitorMessage) {
        if let Err(e) = self.handle(context).send(message).await {
            warn!(instance = %context, error = %e, "Failed to deliver message");
        }
    }

    pub async fn configure(&self, context: &str, channels: &str) {
        self.send(context, MonitorMessage::Configure(channels.to_string()))
            .await;
    }

    pub async fn key_down(&self, context: &str) {
        self.send(context, MonitorMessage::KeyDown).await;
    }

    pub async fn key_up(&self, context: &str) {
        self.send(context, MonitorMessage::KeyUp).await;
    }

    /// Ask every running monitor to poll now.
    pub async fn refresh_all(&self) {
        let handles: Vec<MonitorHandle> = self.actors.iter().map(|e| e.value().clone()).collect();
        for handle in handles {
            if let Err(e) = handle.send(MonitorMessage::Refresh).await {
                debug!(instance = %handle.id(), error = %e, "Skipping stopped actor");
            }
        }
    }

    /// Stop and forget the actor for `context`, cancelling its timers.
    pub fn remove(&self, context: &str) -> bool {
        match self.actors.remove(context) {
            Some((_, handle)) => {
                handle.cancel();
                reap_finished(&mut self.tasks.lock());
                info!(instance = %context, "Button actor removed");
                true
            }
            None => false,
        }
    }

    /// Cancel every actor and wait for all of them to finish.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.actors.clear();

        let mut tasks = std::mem::take(&mut *self.tasks.lock());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((id, outcome)) => debug!(instance = %id, ?outcome, "Button actor joined"),
                Err(e) => warn!(error = %e, "Button actor task failed"),
            }
        }
        info!("All button actors stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::harness;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_event_spawns_and_disappear_removes() {
        let h = harness();
        h.source.set("xqc", "xQc", false);
        let registry = MonitorRegistry::new(
            MonitorConfig::default(),
            h.services.clone(),
            CancellationToken::new(),
        );

        registry.configure("btn-1", "xqc").await;
        registry.configure("btn-2", "xqc").await;
        assert_eq!(registry.len(), 2);

        let handle = registry.handle("btn-1");
        assert!(registry.remove("btn-1"));
        assert!(!registry.remove("btn-1"));
        assert!(!registry.contains("btn-1"));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        registry.shutdown().await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_same_context_reuses_actor() {
        let h = harness();
        let registry = MonitorRegistry::new(
            MonitorConfig::default(),
            h.services.clone(),
            CancellationToken::new(),
        );

        let first = registry.handle("btn");
        let second = registry.handle("btn");
        assert_eq!(registry.len(), 1);
        assert_eq!(first.id(), second.id());

        registry.shutdown().await;
        assert!(first.is_closed());
    }

    #[tokio::test]
    async fn test_finished_actors_are_reaped() {
        let h = harness();
        let registry = MonitorRegistry::new(
            MonitorConfig::default(),
            h.services.clone(),
            CancellationToken::new(),
        );

        for _ in 0..50 {
            let handle = registry.handle("btn");
            assert!(registry.remove("btn"));
            tokio::time::timeout(Duration::from_secs(5), async {
                while !handle.is_closed() {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.task_count() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(registry.is_empty());

        registry.shutdown().await;
    }
}
