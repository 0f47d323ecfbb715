//! Entry capability contract.
//!
//! A table never looks inside an entry. Everything it needs comes from three
//! operations the stored type supplies itself: a hash of its key fields, a
//! key comparison, and a one-line description for diagnostics.

use core::any::Any;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::collections::hash_map::DefaultHasher;

/// Capability every storable value provides.
///
/// `key_hash` must be deterministic and must not change while the entry is
/// linked; the table caches it at `add` and never asks again. Entries whose
/// keys compare equal under `key_eq` must hash equally.
pub trait Entry {
    fn key_hash(&self) -> u64;

    /// Key comparison, not identity. Two distinct entries may be equal.
    fn key_eq(&self, other: &Self) -> bool;

    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// A lookup key for entries of type `E`.
///
/// Every entry is a probe for its own type. Implement this for borrowed key
/// types (e.g. `str` for a symbol entry) to look up without building a whole
/// entry.
pub trait Probe<E: ?Sized> {
    /// Must agree with `E::key_hash` for every entry this probe matches.
    fn probe_hash(&self) -> u64;
    fn matches(&self, entry: &E) -> bool;
}

impl<E: Entry> Probe<E> for E {
    #[inline]
    fn probe_hash(&self) -> u64 {
        self.key_hash()
    }
    #[inline]
    fn matches(&self, entry: &E) -> bool {
        self.key_eq(entry)
    }
}

/// Hash of a key, deterministic for a given build.
///
/// Uses unkeyed SipHash; convenient for `Entry::key_hash` implementations.
pub fn key_hash<K: ?Sized + Hash>(key: &K) -> u64 {
    let mut h = DefaultHasher::new();
    key.hash(&mut h);
    h.finish()
}

/// Object-safe form of [`Entry`], so differently typed entries can share one
/// table. Implemented for every `'static` entry type.
pub trait DynEntry: Any {
    fn dyn_key_hash(&self) -> u64;
    /// False whenever `other` has a different concrete type.
    fn dyn_key_eq(&self, other: &dyn DynEntry) -> bool;
    fn dyn_describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Entry + Any> DynEntry for T {
    fn dyn_key_hash(&self) -> u64 {
        self.key_hash()
    }
    fn dyn_key_eq(&self, other: &dyn DynEntry) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|o| self.key_eq(o))
    }
    fn dyn_describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.describe(f)
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A boxed entry of any type; the element type of heterogeneous tables.
pub type ErasedEntry = Box<dyn DynEntry>;

impl Entry for ErasedEntry {
    fn key_hash(&self) -> u64 {
        (**self).dyn_key_hash()
    }
    fn key_eq(&self, other: &Self) -> bool {
        (**self).dyn_key_eq(&**other)
    }
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).dyn_describe(f)
    }
}

/// Borrow an erased entry as its concrete type, if it is one.
///
/// Use this rather than calling `as_any` on the box: `ErasedEntry` is itself
/// an entry, so method syntax would resolve to the box, not its contents.
pub fn downcast_ref<T: 'static>(entry: &ErasedEntry) -> Option<&T> {
    (**entry).as_any().downcast_ref::<T>()
}

/// Adapter that renders an entry through its `describe` capability.
pub struct Describe<'a, E: ?Sized>(pub &'a E);

impl<E: Entry + ?Sized> fmt::Display for Describe<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.describe(f)
    }
}
