//! # sched-broker
//!
//! The out-of-scope external collaborators, reduced to the narrow trait
//! surfaces the core actually calls (spec §6): the broker driver, leader
//! election, the launch queue, the kill service, and the in-process event
//! bus that ties completions back to observers.
//!
//! None of these traits are implemented here beyond test/standalone
//! fakes — production implementations (the real broker wire protocol, a
//! real consensus-backed leader election, the real offer-matching launch
//! queue) live outside this workspace's scope per spec §1.

pub mod driver;
pub mod error;
pub mod events;
pub mod kill_service;
pub mod launch_queue;
pub mod leader;

pub use driver::BrokerDriver;
pub use error::BrokerError;
pub use events::{DeploymentId, EventBus, SchedulerEvent};
pub use kill_service::{KillReason, KillService};
pub use launch_queue::{LaunchQueue, QueuedInstanceInfo};
pub use leader::{LeaderElection, LeadershipEvent, StandaloneLeaderElection};
