//! TypedTable: a table of erased entries seen through one concrete type.
//!
//! The underlying [`ChainTable<ErasedEntry>`] stores entries polymorphically;
//! this wrapper only ever adds `T` and narrows what comes back out.

use crate::chain_table::{ChainTable, Dump, Handle};
use crate::entry::{downcast_ref, DynEntry, Entry, ErasedEntry, Probe};
use crate::error::TableError;
use core::fmt;
use core::marker::PhantomData;

fn unbox<T: 'static>(entry: ErasedEntry) -> Option<T> {
    <dyn DynEntry as DynEntry>::into_any(entry)
        .downcast::<T>()
        .ok()
        .map(|b| *b)
}

/// Lifts a `Probe<T>` to a probe over erased entries. Entries of any other
/// type never match.
struct Narrowed<'a, Q: ?Sized, T> {
    probe: &'a Q,
    _ty: PhantomData<fn(&T)>,
}

impl<'a, Q: ?Sized, T> Narrowed<'a, Q, T> {
    fn new(probe: &'a Q) -> Self {
        Self {
            probe,
            _ty: PhantomData,
        }
    }
}

impl<Q, T> Probe<ErasedEntry> for Narrowed<'_, Q, T>
where
    Q: ?Sized + Probe<T>,
    T: 'static,
{
    fn probe_hash(&self) -> u64 {
        self.probe.probe_hash()
    }
    fn matches(&self, entry: &ErasedEntry) -> bool {
        downcast_ref::<T>(entry).is_some_and(|e| self.probe.matches(e))
    }
}

/// A narrowing view over [`ChainTable<ErasedEntry>`].
///
/// Only `T` is ever added; lookups match only `T` entries and every result
/// comes back as `&T` or `T`. Handles are those of the underlying table.
pub struct TypedTable<T> {
    table: ChainTable<ErasedEntry>,
    _ty: PhantomData<fn() -> T>,
}

impl<T: Entry + 'static> TypedTable<T> {
    pub fn new() -> Self {
        Self::wrap(ChainTable::new())
    }

    /// See [`ChainTable::with_capacity`].
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        ChainTable::with_capacity(capacity).map(Self::wrap)
    }

    fn wrap(table: ChainTable<ErasedEntry>) -> Self {
        Self {
            table,
            _ty: PhantomData,
        }
    }

    /// The underlying erased table.
    pub fn as_erased(&self) -> &ChainTable<ErasedEntry> {
        &self.table
    }

    pub fn into_erased(self) -> ChainTable<ErasedEntry> {
        self.table
    }

    pub fn size(&self) -> usize {
        self.table.size()
    }
    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn add(&mut self, entry: T) -> Handle {
        self.table.add(Box::new(entry))
    }

    /// First `T` entry matching `probe`, searching from the bucket head.
    pub fn find<Q: ?Sized + Probe<T>>(&self, probe: &Q) -> Option<Handle> {
        self.table.find(&Narrowed::<Q, T>::new(probe))
    }

    /// Like [`find`](Self::find), and moves a hit to the front of its chain.
    pub fn find_cached<Q: ?Sized + Probe<T>>(&mut self, probe: &Q) -> Option<Handle> {
        self.table.find_cached(&Narrowed::<Q, T>::new(probe))
    }

    pub fn contains<Q: ?Sized + Probe<T>>(&self, probe: &Q) -> bool {
        self.find(probe).is_some()
    }

    /// The entry behind `handle`, if it is live and a `T`.
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.table.get(handle).and_then(downcast_ref::<T>)
    }

    /// Unlink the entry and hand it back. Fails with `NotLinked` for stale
    /// or foreign handles, and for entries of another type.
    pub fn remove(&mut self, handle: Handle) -> Result<T, TableError> {
        if self.get(handle).is_none() {
            return Err(TableError::NotLinked);
        }
        unbox(self.table.remove(handle)?).ok_or(TableError::NotLinked)
    }

    pub fn next(&self, previous: Handle) -> Result<Option<Handle>, TableError> {
        self.table.next(previous)
    }

    /// Equal-key `T` entries, as [`ChainTable::duplicates`] walks them.
    pub fn duplicates<Q: ?Sized + Probe<T>>(&self, probe: &Q) -> Duplicates<'_, T> {
        Duplicates {
            table: self,
            next: self.find(probe),
        }
    }

    pub fn clear(&mut self) {
        self.table.clear()
    }

    /// Empty the table, yielding the `T` entries it held.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.table.drain().filter_map(unbox::<T>)
    }

    pub fn load_factor(&self) -> Option<u64> {
        self.table.load_factor()
    }

    pub fn bucket_of<Q: ?Sized + Probe<T>>(&self, probe: &Q) -> usize {
        self.table.bucket_of(&Narrowed::<Q, T>::new(probe))
    }

    pub fn chain(&self, bucket: usize) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.table
            .chain(bucket)
            .filter_map(|(h, e)| downcast_ref::<T>(e).map(|e| (h, e)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        self.table
            .iter()
            .filter_map(|(h, e)| downcast_ref::<T>(e).map(|e| (h, e)))
    }

    pub fn dump(&self) -> Dump<'_, ErasedEntry> {
        self.table.dump()
    }

    pub fn check_links(&self) -> Result<(), TableError> {
        self.table.check_links()
    }
}

impl<T: Entry + 'static> Default for TypedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entry + 'static> fmt::Debug for TypedTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTable")
            .field("size", &self.size())
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Entry + 'static> Extend<T> for TypedTable<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for entry in iter {
            self.add(entry);
        }
    }
}

impl<T: Entry + 'static> FromIterator<T> for TypedTable<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

/// Iterator returned by [`TypedTable::duplicates`].
pub struct Duplicates<'a, T> {
    table: &'a TypedTable<T>,
    next: Option<Handle>,
}

impl<'a, T: Entry + 'static> Iterator for Duplicates<'a, T> {
    type Item = (Handle, &'a T);
    fn next(&mut self) -> Option<Self::Item> {
        let h = self.next.take()?;
        // `h` came from this table and nothing can unlink it while we borrow
        // the table, so `next` cannot fail here.
        self.next = self.table.next(h).ok().flatten();
        self.table.get(h).map(|e| (h, e))
    }
}
