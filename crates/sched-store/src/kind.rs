//! The two entity kinds the persistent store indexes: apps and groups.

use std::fmt;

/// Which entity namespace a stored path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    App,
    Group,
    Deployment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::App => write!(f, "app"),
            EntityKind::Group => write!(f, "group"),
            EntityKind::Deployment => write!(f, "deployment"),
        }
    }
}
