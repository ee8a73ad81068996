//! Small set of unique `u64` values backed by a vector.
//!
//! Membership checks are linear. Removal swaps the last item into the freed
//! slot, so insertion order is not preserved.

use serde::{Deserialize, Serialize};

/// Unique `u64` values in a compact array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u64>", into = "Vec<u64>")]
pub struct U64Set {
    items: Vec<u64>,
}

impl U64Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, item: u64) -> bool {
        self.items.contains(&item)
    }

    /// Append `item` unless present. Returns whether it was added.
    pub fn add(&mut self, item: u64) -> bool {
        if self.has(item) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Remove `item` if present. Returns whether it was removed.
    pub fn remove(&mut self, item: u64) -> bool {
        match self.items.iter().position(|&x| x == item) {
            Some(idx) => {
                self.items.swap_remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn items(&self) -> &[u64] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<u64> for U64Set {
    /// Duplicates are dropped, keeping the first occurrence.
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut set = U64Set::new();
        for item in iter {
            set.add(item);
        }
        set
    }
}

impl From<Vec<u64>> for U64Set {
    fn from(items: Vec<u64>) -> Self {
        items.into_iter().collect()
    }
}

impl From<U64Set> for Vec<u64> {
    fn from(set: U64Set) -> Self {
        set.items
    }
}
