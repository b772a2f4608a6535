//! Per-task consecutive-result tracking with exponential backoff.

use std::time::Duration;

use sched_core::HealthCheckSpec;
use tracing::{debug, warn};

use crate::probe::ProbeResult;

/// A task's last-known health verdict, independent of liveness — this is
/// exactly the state spec §4.6 (iii) says must survive a `reconcileWith`
/// re-registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// Tracks consecutive probe results for a single task.
#[derive(Debug)]
pub struct HealthTracker {
    status: HealthStatus,
    consecutive_failures: u32,
    consecutive_successes: u32,
    unhealthy_threshold: u32,
    current_backoff: Duration,
    base_interval: Duration,
    max_backoff: Duration,
    last_failure: Option<ProbeResult>,
    last_success: bool,
}

impl HealthTracker {
    pub fn new(spec: &HealthCheckSpec) -> Self {
        let base_interval = Duration::from_secs(spec.interval_secs as u64);
        Self {
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            unhealthy_threshold: spec.max_consecutive_failures,
            current_backoff: base_interval,
            base_interval,
            max_backoff: Duration::from_secs(60),
            last_failure: None,
            last_success: false,
        }
    }

    #[cfg(test)]
    pub fn with_thresholds(unhealthy_threshold: u32, interval: Duration) -> Self {
        Self {
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            consecutive_successes: 0,
            unhealthy_threshold,
            current_backoff: interval,
            base_interval: interval,
            max_backoff: Duration::from_secs(60),
            last_failure: None,
            last_success: false,
        }
    }

    /// Record a probe result and return the new health status.
    pub fn record(&mut self, result: ProbeResult) -> HealthStatus {
        match result {
            ProbeResult::Healthy => {
                self.consecutive_failures = 0;
                self.consecutive_successes += 1;
                self.current_backoff = self.base_interval;
                self.last_success = true;

                if self.status != HealthStatus::Healthy {
                    debug!(successes = self.consecutive_successes, "task recovered to healthy");
                }
                self.status = HealthStatus::Healthy;
            }
            ProbeResult::Unhealthy | ProbeResult::Failed => {
                self.consecutive_successes = 0;
                self.consecutive_failures += 1;
                self.last_failure = Some(result);
                self.current_backoff = (self.current_backoff * 2).min(self.max_backoff);

                if self.consecutive_failures >= self.unhealthy_threshold {
                    if self.status != HealthStatus::Unhealthy {
                        warn!(
                            failures = self.consecutive_failures,
                            threshold = self.unhealthy_threshold,
                            "task marked unhealthy"
                        );
                    }
                    self.status = HealthStatus::Unhealthy;
                }
            }
        }
        self.status
    }

    pub fn status(&self) -> HealthStatus {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn exceeds_max_failures(&self) -> bool {
        self.consecutive_failures >= self.unhealthy_threshold
    }

    pub fn next_interval(&self) -> Duration {
        self.current_backoff
    }

    pub fn last_failure(&self) -> Option<ProbeResult> {
        self.last_failure
    }

    pub fn last_success(&self) -> bool {
        self.last_success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_to_healthy_on_first_success() {
        let mut tracker = HealthTracker::with_thresholds(3, Duration::from_secs(5));
        assert_eq!(tracker.record(ProbeResult::Healthy), HealthStatus::Healthy);
    }

    #[test]
    fn marks_unhealthy_only_after_threshold_failures() {
        let mut tracker = HealthTracker::with_thresholds(3, Duration::from_secs(5));
        assert_eq!(tracker.record(ProbeResult::Failed), HealthStatus::Unknown);
        assert_eq!(tracker.record(ProbeResult::Failed), HealthStatus::Unknown);
        assert_eq!(tracker.record(ProbeResult::Failed), HealthStatus::Unhealthy);
        assert!(tracker.exceeds_max_failures());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut tracker = HealthTracker::with_thresholds(10, Duration::from_secs(5));
        tracker.record(ProbeResult::Failed);
        assert_eq!(tracker.next_interval(), Duration::from_secs(10));
        tracker.record(ProbeResult::Failed);
        assert_eq!(tracker.next_interval(), Duration::from_secs(20));
        for _ in 0..10 {
            tracker.record(ProbeResult::Failed);
        }
        assert_eq!(tracker.next_interval(), Duration::from_secs(60));
    }

    #[test]
    fn success_resets_backoff_and_failure_count() {
        let mut tracker = HealthTracker::with_thresholds(3, Duration::from_secs(5));
        tracker.record(ProbeResult::Failed);
        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.next_interval(), Duration::from_secs(5));
    }

    #[test]
    fn last_failure_survives_subsequent_success() {
        let mut tracker = HealthTracker::with_thresholds(3, Duration::from_secs(5));
        tracker.record(ProbeResult::Unhealthy);
        tracker.record(ProbeResult::Healthy);
        assert_eq!(tracker.last_failure(), Some(ProbeResult::Unhealthy));
        assert!(tracker.last_success());
    }
}
