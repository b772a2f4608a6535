//! `PathId` — hierarchical, slash-separated identifiers for groups and apps.
//!
//! A `PathId` is always absolute (`/a/b/c`), case-sensitive, and never
//! contains `.` or `..` segments. The empty path (`/`) is the root.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A hierarchical path identifying a group or an app within the group tree.
///
/// Two `PathId`s compare equal iff their canonical segment lists are equal;
/// there is no case folding.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathId {
    segments: Vec<String>,
}

impl PathId {
    /// The root path (`/`).
    pub fn root() -> Self {
        Self { segments: Vec::new() }
    }

    /// Parse an absolute path string (e.g. `/prod/api`).
    ///
    /// Rejects relative paths and `.`/`..` segments.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        if raw.is_empty() || raw == "/" {
            return Ok(Self::root());
        }
        if !raw.starts_with('/') {
            return Err(CoreError::InvalidPath(format!(
                "path must be absolute: {raw}"
            )));
        }
        let mut segments = Vec::new();
        for part in raw.split('/') {
            if part.is_empty() {
                continue;
            }
            if part == "." || part == ".." {
                return Err(CoreError::InvalidPath(format!(
                    "path must not contain '.' or '..' segments: {raw}"
                )));
            }
            segments.push(part.to_string());
        }
        Ok(Self { segments })
    }

    /// Canonicalize `raw` against this path as a base, the way a relative
    /// reference inside a group is resolved against its enclosing group id.
    pub fn canonicalize(&self, raw: &str) -> Result<Self, CoreError> {
        if raw.starts_with('/') {
            return Self::parse(raw);
        }
        let mut joined = self.to_string();
        if !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(raw);
        Self::parse(&joined)
    }

    /// Whether `self` is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `other` is a (strict or non-strict) descendant of `self`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Whether `other` is a strict descendant of `self`.
    pub fn is_strict_ancestor_of(&self, other: &Self) -> bool {
        self.is_ancestor_of(other) && self != other
    }

    /// The path segments, root-to-leaf.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for PathId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathId> for String {
    fn from(value: PathId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_empty_path() {
        let root = PathId::root();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
    }

    #[test]
    fn parses_absolute_path() {
        let p = PathId::parse("/prod/api").unwrap();
        assert_eq!(p.segments(), &["prod".to_string(), "api".to_string()]);
        assert_eq!(p.to_string(), "/prod/api");
    }

    #[test]
    fn rejects_relative_path() {
        assert!(PathId::parse("prod/api").is_err());
    }

    #[test]
    fn rejects_dot_segments() {
        assert!(PathId::parse("/prod/../api").is_err());
        assert!(PathId::parse("/prod/./api").is_err());
    }

    #[test]
    fn case_sensitive_equality() {
        let a = PathId::parse("/Prod/api").unwrap();
        let b = PathId::parse("/prod/api").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn collapses_duplicate_slashes() {
        let p = PathId::parse("/prod//api").unwrap();
        assert_eq!(p.to_string(), "/prod/api");
    }

    #[test]
    fn ancestor_relationship() {
        let parent = PathId::parse("/prod").unwrap();
        let child = PathId::parse("/prod/api").unwrap();
        assert!(parent.is_ancestor_of(&child));
        assert!(parent.is_strict_ancestor_of(&child));
        assert!(!child.is_strict_ancestor_of(&parent));
        assert!(parent.is_ancestor_of(&parent));
        assert!(!parent.is_strict_ancestor_of(&parent));
    }

    #[test]
    fn parent_of_root_is_none() {
        assert!(PathId::root().parent().is_none());
    }

    #[test]
    fn parent_of_child() {
        let child = PathId::parse("/prod/api").unwrap();
        assert_eq!(child.parent().unwrap().to_string(), "/prod");
    }

    #[test]
    fn canonicalize_relative_against_base() {
        let base = PathId::parse("/prod").unwrap();
        let resolved = base.canonicalize("api").unwrap();
        assert_eq!(resolved.to_string(), "/prod/api");
    }

    #[test]
    fn canonicalize_absolute_ignores_base() {
        let base = PathId::parse("/prod").unwrap();
        let resolved = base.canonicalize("/staging/api").unwrap();
        assert_eq!(resolved.to_string(), "/staging/api");
    }
}
