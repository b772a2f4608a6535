//! Errors for the external broker-facing interfaces.

use thiserror::Error;

/// Errors surfaced by the broker driver, launch queue, or kill service.
///
/// Maps onto spec §7's `BrokerTransient` kind: these are always treated as
/// transient by callers (the Scheduler Actor emits a disconnect event and
/// triggers leadership abdication rather than crashing on them).
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("broker driver call failed: {0}")]
    DriverCall(String),

    #[error("broker driver disconnected")]
    Disconnected,

    #[error("launch queue call failed: {0}")]
    LaunchQueue(String),

    #[error("kill service call failed: {0}")]
    Kill(String),
}
