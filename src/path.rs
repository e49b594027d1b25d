//! Hierarchical file names with a canonical string form.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DfsError;

/// Separator used by the canonical string form.
pub const SEPARATOR: char = '/';

/// Maximum length of a path string accepted from the wire.
pub const MAX_PATH_LEN: usize = 1024;

/// Immutable hierarchical name addressing one object in the directory tree.
///
/// A path is an ordered sequence of non-empty components; components never
/// contain `/` or `:`. The root is the empty sequence and prints as `"/"`.
/// Ordering is lexicographic, component by component, which gives the total
/// order the locking protocol relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DfsPath {
    components: Vec<String>,
}

impl DfsPath {
    /// The distinguished root path `"/"`.
    pub fn root() -> Self {
        Self { components: Vec::new() }
    }

    /// True iff this is the root.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// The path of the enclosing directory, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self { components: self.components[..self.components.len() - 1].to_vec() })
    }

    /// The final component, or `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Extends this path by one component.
    pub fn child(&self, component: &str) -> Result<Self, DfsError> {
        validate_component(component)?;
        let mut components = self.components.clone();
        components.push(component.to_owned());
        Ok(Self { components })
    }

    /// True iff `prefix` is a prefix of this path, including equality.
    pub fn is_subpath(&self, prefix: &Self) -> bool {
        self.components.len() >= prefix.components.len()
            && self.components[..prefix.components.len()] == prefix.components[..]
    }

    /// Iterates over the components from the root outwards.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// Number of components; zero for the root.
    pub fn depth(&self) -> usize {
        self.components.len()
    }
}

fn validate_component(component: &str) -> Result<(), DfsError> {
    if component.is_empty() {
        return Err(DfsError::invalid("path component is empty"));
    }
    if component.contains(SEPARATOR) || component.contains(':') {
        return Err(DfsError::invalid(format!("path component {component:?} contains '/' or ':'")));
    }
    Ok(())
}

impl FromStr for DfsPath {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() > MAX_PATH_LEN {
            return Err(DfsError::invalid("path exceeds maximum length"));
        }
        let Some(rest) = s.strip_prefix(SEPARATOR) else {
            return Err(DfsError::invalid(format!("path {s:?} does not begin at the root")));
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let mut components = Vec::new();
        for component in rest.split(SEPARATOR) {
            validate_component(component)?;
            components.push(component.to_owned());
        }
        Ok(Self { components })
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> DfsPath {
        s.parse().unwrap()
    }

    #[test]
    fn parse_round_trips_canonical_strings() {
        for s in ["/", "/a", "/a/b/c", "/storage-1/data.bin"] {
            assert_eq!(path(s).to_string(), s);
        }
    }

    #[test]
    fn components_recompose_the_original() {
        let p = path("/a/b/c");
        let rebuilt = p
            .components()
            .try_fold(DfsPath::root(), |acc, component| acc.child(component))
            .unwrap();
        assert_eq!(rebuilt, p);
    }

    #[test]
    fn rejects_malformed_strings() {
        for s in ["", "a/b", "//", "/a//b", "/a/", "/a:b", "relative"] {
            assert!(s.parse::<DfsPath>().is_err(), "accepted {s:?}");
        }
    }

    #[test]
    fn rejects_bad_components() {
        let root = DfsPath::root();
        assert!(root.child("").is_err());
        assert!(root.child("a/b").is_err());
        assert!(root.child("a:b").is_err());
    }

    #[test]
    fn parent_and_last() {
        let p = path("/a/b/c");
        assert_eq!(p.last(), Some("c"));
        assert_eq!(p.parent(), Some(path("/a/b")));
        assert_eq!(path("/a").parent(), Some(DfsPath::root()));
        assert_eq!(DfsPath::root().parent(), None);
        assert_eq!(DfsPath::root().last(), None);
    }

    #[test]
    fn ordering_is_lexicographic_by_component() {
        assert!(path("/a") < path("/a/b"));
        assert!(path("/a/b") < path("/a/c"));
        assert!(path("/a/z") < path("/b"));
        assert!(DfsPath::root() < path("/a"));
    }

    #[test]
    fn subpath_is_reflexive_and_transitive() {
        let p = path("/a");
        let q = path("/a/b");
        let r = path("/a/b/c");
        assert!(p.is_subpath(&p));
        assert!(q.is_subpath(&p));
        assert!(r.is_subpath(&q));
        assert!(r.is_subpath(&p));
        assert!(!p.is_subpath(&q));
        assert!(!path("/ab").is_subpath(&p));
    }

    #[test]
    fn every_path_descends_from_root() {
        for s in ["/", "/a", "/x/y/z"] {
            assert!(path(s).is_subpath(&DfsPath::root()));
        }
    }
}
