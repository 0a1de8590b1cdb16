//! Hash collections keyed with the Fx hasher.
//!
//! Keys in this crate are small integers (window ids, atoms), where Fx is
//! much faster than SipHash.

pub type HashMap<K, V> = rustc_hash::FxHashMap<K, V>;
pub type HashSet<K> = rustc_hash::FxHashSet<K>;
