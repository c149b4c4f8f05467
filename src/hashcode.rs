//! Set element identity.
//!
//! Elements of a set-typed block are keyed by a 32-bit hash of a canonical
//! string built from their significant fields, plus their full encoded value
//! for fields the hash leaves out. Reordering a set never produces a diff; a
//! change to any field does.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

/// Keys of every element in a set: identity hash and encoded value.
pub type Fingerprint = BTreeSet<(u32, String)>;

/// Hash a canonical string to a set element identifier (CRC-32, IEEE).
pub fn string(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes())
}

/// A set element with a stable identity hash.
pub trait SetHash: Serialize {
    /// The canonical string the hash is computed from.
    fn hash_key(&self) -> String;

    /// The element's identity.
    fn set_hash(&self) -> u32 {
        string(&self.hash_key())
    }

    /// Hash plus encoded value. Elements with equal keys are duplicates.
    fn set_key(&self) -> (u32, String) {
        (self.set_hash(), serde_json::to_string(self).unwrap_or_default())
    }
}

/// Drop exact duplicates and order the rest by hash.
///
/// Elements sharing a hash but differing in another field are both kept.
pub fn canonicalize<T: SetHash>(items: Vec<T>) -> Vec<T> {
    let mut by_key = BTreeMap::new();
    for item in items {
        by_key.entry(item.set_key()).or_insert(item);
    }
    by_key.into_values().collect()
}

/// The keys of every element in a set.
pub fn fingerprint<T: SetHash>(items: &[T]) -> Fingerprint {
    items.iter().map(SetHash::set_key).collect()
}
