//! Timestamps and version identifiers for the versioned group/app repository.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in time, serialized as RFC 3339 / ISO-8601 with offset.
///
/// Every stored group or app revision is keyed by the `Timestamp` at which
/// it was written; the repository never reuses a timestamp for two distinct
/// revisions of the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Wrap an existing `DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Format as RFC 3339, e.g. `2026-07-31T12:00:00Z`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn parse(raw: &str) -> Result<Self, chrono::ParseError> {
        DateTime::parse_from_rfc3339(raw).map(|dt| Self(dt.with_timezone(&Utc)))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

/// Identifies a single revision of a versioned object (group or app).
///
/// `VersionInfo` distinguishes the revision at which an object's own
/// definition last changed from the revision at which any of its
/// dependents (e.g. a group whose child app changed) last changed —
/// mirroring the distinction the repository needs to decide whether a
/// redeploy is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    /// The timestamp of the last change to this object's own definition.
    pub last_config_change: Timestamp,
    /// The timestamp of the last change to this object or any of its
    /// transitive children.
    pub last_scaling_change: Timestamp,
}

impl VersionInfo {
    /// Construct a fresh `VersionInfo` where both timestamps are `at`.
    pub fn fresh_at(at: Timestamp) -> Self {
        Self {
            last_config_change: at,
            last_scaling_change: at,
        }
    }

    /// The version to use for a scale-only change (instance count, not
    /// config): `last_config_change` is preserved, `last_scaling_change`
    /// is bumped.
    pub fn with_scaling_change_at(&self, at: Timestamp) -> Self {
        Self {
            last_config_change: self.last_config_change,
            last_scaling_change: at,
        }
    }

    /// The version to use after a config change: both timestamps advance.
    pub fn with_config_change_at(&self, at: Timestamp) -> Self {
        Self {
            last_config_change: at,
            last_scaling_change: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_round_trip() {
        let ts = Timestamp::from_datetime(Utc::now());
        let s = ts.to_rfc3339();
        let parsed = Timestamp::parse(&s).unwrap();
        assert_eq!(ts, parsed);
    }

    #[test]
    fn scaling_change_preserves_config_change() {
        let t0 = Timestamp::from_datetime(Utc::now());
        let v0 = VersionInfo::fresh_at(t0);
        let t1 = Timestamp::from_datetime(t0.as_datetime() + chrono::Duration::seconds(5));
        let v1 = v0.with_scaling_change_at(t1);
        assert_eq!(v1.last_config_change, t0);
        assert_eq!(v1.last_scaling_change, t1);
    }

    #[test]
    fn config_change_advances_both() {
        let t0 = Timestamp::from_datetime(Utc::now());
        let v0 = VersionInfo::fresh_at(t0);
        let t1 = Timestamp::from_datetime(t0.as_datetime() + chrono::Duration::seconds(5));
        let v1 = v0.with_config_change_at(t1);
        assert_eq!(v1.last_config_change, t1);
        assert_eq!(v1.last_scaling_change, t1);
    }
}
