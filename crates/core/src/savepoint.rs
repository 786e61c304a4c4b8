//! Savepoints
//!
//! A savepoint is a named capture point qualified by metainfo. Identity is
//! structural: two savepoints built independently with the same name and the
//! same metainfo (in any insertion order) are the same capture point. This is
//! what lets one code location be captured many times, e.g. once per time
//! step with the step number in metainfo.

use crate::metainfo::{MetaValue, MetainfoSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named, metainfo-qualified capture point
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Savepoint {
    name: String,
    #[serde(default)]
    metainfo: MetainfoSet,
}

impl Savepoint {
    /// Savepoint with empty metainfo
    pub fn new(name: impl Into<String>) -> Self {
        Savepoint {
            name: name.into(),
            metainfo: MetainfoSet::new(),
        }
    }

    /// Savepoint with the given metainfo
    pub fn with_metainfo(name: impl Into<String>, metainfo: MetainfoSet) -> Self {
        Savepoint {
            name: name.into(),
            metainfo,
        }
    }

    /// Add one metainfo entry (builder)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metainfo.set(key, value);
        self
    }

    /// Savepoint name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Savepoint metainfo
    pub fn metainfo(&self) -> &MetainfoSet {
        &self.metainfo
    }
}

impl fmt::Display for Savepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.metainfo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equal_when_built_independently() {
        let a = Savepoint::new("step").with("it", 1i32).with("stage", "rk");
        let b = Savepoint::new("step").with("stage", "rk").with("it", 1i32);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_same_name_different_metainfo_distinct() {
        let a = Savepoint::new("step").with("it", 1i32);
        let b = Savepoint::new("step").with("it", 2i32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_different_name_distinct() {
        assert_ne!(Savepoint::new("in"), Savepoint::new("out"));
    }

    #[test]
    fn test_display() {
        let sp = Savepoint::new("step1").with("it", 4i32);
        assert_eq!(sp.to_string(), "step1{it=4}");
        assert_eq!(Savepoint::new("in").to_string(), "in{}");
    }
}
