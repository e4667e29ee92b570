//! Entity identity
//!
//! Every major entity (node, mesh, texture) carries a process-unique,
//! monotonically assigned numeric tag and an optional name. Hash and
//! equality go by tag.

use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TAG: AtomicU32 = AtomicU32::new(1);

/// Allocate the next process-unique tag.
pub fn next_tag() -> u32 {
    NEXT_TAG.fetch_add(1, Ordering::Relaxed)
}

/// Stable identity of a scene entity.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Process-unique, monotonically assigned tag
    pub tag: u32,
    /// Optional human-readable name
    pub name: Option<String>,
}

impl Identity {
    /// Create an anonymous identity with a fresh tag.
    pub fn new() -> Self {
        Self {
            tag: next_tag(),
            name: None,
        }
    }

    /// Create a named identity with a fresh tag.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            tag: next_tag(),
            name: Some(name.into()),
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_unique_and_monotonic() {
        let a = Identity::new();
        let b = Identity::new();
        assert!(b.tag > a.tag);
        assert_ne!(a, b);
    }

    #[test]
    fn equality_ignores_name() {
        let mut a = Identity::named("alpha");
        let b = a.clone();
        a.name = Some("beta".into());
        assert_eq!(a, b);
    }
}
