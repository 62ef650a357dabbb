//! Closed category set
//!
//! A deployment defines an ordered, closed set of request categories plus one
//! default. `Category` values can only be obtained from a `CategorySet`, so a
//! category handed to the dispatch layer is always a member of the set.

use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// One member of the closed category set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
    name: Arc<str>,
}

impl Category {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
        }
    }

    /// Canonical string of this category
    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Ordered closed set of categories with a designated default
#[derive(Debug, Clone)]
pub struct CategorySet {
    members: Vec<Category>,
    default_index: usize,
}

impl CategorySet {
    /// Build a set from canonical names in configuration order.
    ///
    /// Returns `None` when `names` is empty, contains a blank or duplicate
    /// (case-insensitive) name, or does not contain `default`. Callers turn
    /// that into a configuration error; config validation normally catches
    /// these cases first with a more specific message.
    pub fn new<S: AsRef<str>>(names: &[S], default: &str) -> Option<Self> {
        let mut members: Vec<Category> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || members.iter().any(|c| c.name.eq_ignore_ascii_case(name)) {
                return None;
            }
            members.push(Category::new(name));
        }

        let default_index = members
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(default.trim()))?;

        Some(Self {
            members,
            default_index,
        })
    }

    /// The configured fallback category
    pub fn default_category(&self) -> &Category {
        &self.members[self.default_index]
    }

    /// Case-insensitive, whitespace-trimmed lookup of a canonical name
    pub fn get(&self, name: &str) -> Option<&Category> {
        let name = name.trim();
        self.members
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Position of a category in configuration order
    pub fn position(&self, category: &Category) -> Option<usize> {
        self.members.iter().position(|c| c == category)
    }
}
