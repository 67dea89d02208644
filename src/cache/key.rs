//! Page Cache Key Module
//!
//! Order-sensitive composite key identifying one cacheable page response.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::error::Result;

// == Page Cache Key ==
/// Ordered sequence of `(name, value)` attributes.
///
/// Values are stored as their JSON text. Two keys are equal only when they
/// hold the same pairs in the same insertion order; the name index exists
/// purely for lookups and takes no part in equality or hashing.
#[derive(Debug, Clone, Default)]
pub struct PageCacheKey {
    /// Attributes in insertion order
    pairs: Vec<(String, String)>,
    /// Name -> position in `pairs`
    index: HashMap<String, usize>,
}

impl PageCacheKey {
    // == Constructor ==
    /// Creates an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    // == Set Attribute ==
    /// Sets `name` to the serialized form of `value`.
    ///
    /// An unseen name is appended. A name already holding an equal value is
    /// left untouched. A name holding a different value is updated in place
    /// and keeps its original position.
    pub fn set_attribute<V: Serialize + ?Sized>(&mut self, name: &str, value: &V) -> Result<()> {
        let serialized = serde_json::to_string(value)?;

        match self.index.get(name) {
            Some(&position) => {
                if self.pairs[position].1 != serialized {
                    self.pairs[position].1 = serialized;
                }
            }
            None => {
                self.index.insert(name.to_string(), self.pairs.len());
                self.pairs.push((name.to_string(), serialized));
            }
        }

        Ok(())
    }

    // == Lookups ==
    /// Returns the serialized value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&position| self.pairs[position].1.as_str())
    }

    /// Returns true if `name` has been set.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Iterates attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no attribute has been set.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    // == String Form ==
    /// Returns the backend key: `name=value` pairs joined by `;`.
    pub fn as_cache_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PageCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, (name, value)) in self.pairs.iter().enumerate() {
            if position > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}={}", name, value)?;
        }
        Ok(())
    }
}

impl PartialEq for PageCacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl Eq for PageCacheKey {}

impl Hash for PageCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.pairs.len());
        for (name, value) in &self.pairs {
            name.hash(state);
            value.hash(state);
        }
    }
}
