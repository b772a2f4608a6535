//! Leader-election signal (spec §6: "provides an elected/standby signal").
//!
//! Actual consensus/election is out of scope; the Scheduler Actor only
//! needs to observe transitions between the two states.

use tokio::sync::broadcast;

/// A leadership transition as observed by the Scheduler Actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadershipEvent {
    ElectedAsLeader,
    Standby,
}

/// The leader-election surface: a broadcast channel of transitions.
pub trait LeaderElection: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent>;
}

/// A `LeaderElection` suitable for a single-node deployment, or for tests:
/// always reports itself as leader immediately on subscribe.
pub struct StandaloneLeaderElection {
    sender: broadcast::Sender<LeadershipEvent>,
}

impl StandaloneLeaderElection {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self { sender }
    }

    pub fn announce(&self, event: LeadershipEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for StandaloneLeaderElection {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderElection for StandaloneLeaderElection {
    fn subscribe(&self) -> broadcast::Receiver<LeadershipEvent> {
        self.sender.subscribe()
    }
}
