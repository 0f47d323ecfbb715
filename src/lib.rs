//! chain-table: a chained hash table of self-describing entries, with
//! duplicate keys and move-to-front lookup.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a symbol-table style index where the stored values define their
//!   own key identity, equal keys may coexist, and hot keys migrate to the
//!   front of their collision chain.
//! - Layers:
//!   - Entry/Probe: the capability an entry type supplies (`key_hash`,
//!     `key_eq`, `describe`), plus borrowed lookup keys.
//!   - ChainTable<E>: fixed bucket array of doubly linked chains over a slot
//!     arena; returns generational `Handle`s.
//!   - TypedTable<T>: a ChainTable of type-erased entries narrowed to one
//!     concrete type.
//!
//! Constraints
//! - Single-threaded: tables are `!Send`/`!Sync`; callers that share a table
//!   wrap it in their own lock.
//! - The bucket count is fixed at construction (default 127). There is no
//!   resizing; `load_factor` reports fill so callers can decide to rebuild.
//! - `add` never rejects: keys are not required to be unique.
//! - O(1) unlink. Each node records what points at it (its bucket or its
//!   predecessor), so `remove` and promotion never walk the chain.
//!
//! Ownership
//! - `add` moves the entry into the table. `remove` and `drain` move it back
//!   out. `clear` and dropping the table drop whatever is still linked.
//! - Handles are plain copyable names. A handle for a removed entry, or one
//!   issued by another table, is reported as `TableError::NotLinked`.
//!
//! Hashing
//! - `key_hash` runs once per `add`; the value is cached on the node and never
//!   recomputed, so keys must not change while linked.
//! - `key_hash` (the free function) is a deterministic SipHash helper for
//!   entry implementations.
//!
//! Reentrancy
//! - Entry callbacks run while a chain is being walked. Debug builds panic if
//!   a callback re-enters the same table; release builds skip the check.
//!
//! Duplicate scans
//! - `next` continues from a previous hit only while the following entry has
//!   the same key. Runs of equal keys stay contiguous when added back to back;
//!   a colliding entry added in between, or a promotion, splits the run.

pub mod chain_table;
mod chain_table_proptest;
pub mod entry;
mod error;
mod reentrancy;
pub mod typed;

// Public surface
pub use chain_table::{ChainTable, Handle, DEFAULT_CAPACITY};
pub use entry::{downcast_ref, key_hash, Describe, DynEntry, Entry, ErasedEntry, Probe};
pub use error::TableError;
pub use typed::TypedTable;
