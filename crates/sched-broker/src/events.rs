//! The in-process event bus (spec §6).
//!
//! Every component that changes durable or cluster-visible state publishes
//! here; nothing downstream is required to listen; there is no persistence
//! or sequence numbering — a lagging subscriber simply misses events, the
//! same tradeoff `tokio::sync::broadcast` makes.

use sched_core::{PathId, Timestamp};
use sched_instance::InstanceId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one deployment plan across its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(pub Uuid);

impl std::fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Events published by the core (spec §6).
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    SchedulerRegistered,
    SchedulerReregistered,
    SchedulerDisconnected,
    DeploymentStarted { deployment_id: DeploymentId },
    DeploymentSuccess { deployment_id: DeploymentId },
    DeploymentFailed { deployment_id: DeploymentId, reason: String },
    AppTerminated { app_id: PathId },
    InstanceChanged { app_id: PathId, instance_id: InstanceId },
    HealthCheckAdded { app_id: PathId, version: Timestamp },
    HealthCheckRemoved { app_id: PathId, version: Timestamp },
}

/// The in-process, non-persisted event bus.
#[derive(Clone)]
pub struct EventBus {
    sender: tokio::sync::broadcast::Sender<SchedulerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: SchedulerEvent) {
        // No subscribers is a normal, silent case (e.g. in tests).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SchedulerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(SchedulerEvent::AppTerminated {
            app_id: PathId::parse("/app").unwrap(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SchedulerEvent::AppTerminated { .. }));
    }
}
