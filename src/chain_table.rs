//! ChainTable: a fixed array of buckets, each heading a doubly linked chain of
//! entries kept in a slot arena.
//!
//! Links are arena keys rather than pointers. A node's `back` names whatever
//! currently points at it: its bucket when it heads the chain, otherwise its
//! predecessor. That is enough to unlink any node in O(1) without walking the
//! chain, which `remove` and move-to-front promotion both rely on.

use crate::entry::{Describe, Entry, Probe};
use crate::error::TableError;
use crate::reentrancy::DebugReentrancy;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashSet;
use slotmap::{DefaultKey, SlotMap};

/// Bucket count used when none (or zero) is requested. Prime, to spread
/// hash values that share low bits.
pub const DEFAULT_CAPACITY: usize = 127;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct TableId(u64);

impl TableId {
    fn fresh() -> Self {
        TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Names one linked entry of one table.
///
/// Handles are generational: once the entry is removed (or the table cleared)
/// the handle stops resolving, even if its slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    key: DefaultKey,
    table: TableId,
}

impl Handle {
    pub fn entry<'a, E: Entry>(&self, table: &'a ChainTable<E>) -> Option<&'a E> {
        table.get(*self)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Back {
    Bucket(u32),
    Node(DefaultKey),
}

#[derive(Debug)]
struct Node<E> {
    entry: E,
    hash: u64,
    back: Back,
    next: Option<DefaultKey>,
}

/// Bucket heads plus the arena of nodes. Every node in the arena is linked
/// into exactly one chain.
struct Chains<E> {
    buckets: Box<[Option<DefaultKey>]>,
    nodes: SlotMap<DefaultKey, Node<E>>,
}

impl<E: Entry> Chains<E> {
    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    fn link_front(&mut self, bucket: usize, k: DefaultKey) {
        let old = self.buckets[bucket];
        if let Some(old) = old {
            self.nodes[old].back = Back::Node(k);
        }
        let node = &mut self.nodes[k];
        node.back = Back::Bucket(bucket as u32);
        node.next = old;
        self.buckets[bucket] = Some(k);
    }

    fn unlink(&mut self, k: DefaultKey) {
        let Node { back, next, .. } = self.nodes[k];
        match back {
            Back::Bucket(b) => self.buckets[b as usize] = next,
            Back::Node(prev) => self.nodes[prev].next = next,
        }
        if let Some(next) = next {
            self.nodes[next].back = back;
        }
    }

    fn find<Q: ?Sized + Probe<E>>(&self, probe: &Q) -> Option<DefaultKey> {
        let hash = probe.probe_hash();
        let mut cur = self.buckets[self.bucket_index(hash)];
        while let Some(k) = cur {
            let node = &self.nodes[k];
            if node.hash == hash && probe.matches(&node.entry) {
                return Some(k);
            }
            cur = node.next;
        }
        None
    }

    /// The successor of `k`, if it has the same key. Stops at the first
    /// non-matching entry.
    fn next_match(&self, k: DefaultKey) -> Option<DefaultKey> {
        let prev = &self.nodes[k];
        let n = prev.next?;
        let node = &self.nodes[n];
        (node.hash == prev.hash && node.entry.key_eq(&prev.entry)).then_some(n)
    }
}

/// Chained hash table over entries that carry their own key identity.
///
/// Keys need not be unique: `add` links entries with equal keys side by side
/// and `next`/`duplicates` walk them. The bucket count is fixed at
/// construction.
///
/// Single-threaded; the type is neither `Send` nor `Sync`.
pub struct ChainTable<E> {
    chains: Chains<E>,
    id: TableId,
    reentrancy: DebugReentrancy,
}

impl<E: Entry> ChainTable<E> {
    /// A table with [`DEFAULT_CAPACITY`] buckets.
    pub fn new() -> Self {
        Self::from_buckets(vec![None; DEFAULT_CAPACITY].into_boxed_slice())
    }

    /// A table with `capacity` buckets; `0` selects [`DEFAULT_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Result<Self, TableError> {
        let size = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        if u32::try_from(size).is_err() {
            return Err(TableError::InvalidCapacity {
                requested: capacity,
            });
        }
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(size)?;
        buckets.resize(size, None);
        Ok(Self::from_buckets(buckets.into_boxed_slice()))
    }

    fn from_buckets(buckets: Box<[Option<DefaultKey>]>) -> Self {
        let id = TableId::fresh();
        log::debug!("chain table {} created with {} buckets", id.0, buckets.len());
        Self {
            chains: Chains {
                buckets,
                nodes: SlotMap::with_key(),
            },
            id,
            reentrancy: DebugReentrancy::new(),
        }
    }

    #[inline]
    fn handle(&self, key: DefaultKey) -> Handle {
        Handle {
            key,
            table: self.id,
        }
    }

    fn resolve(&self, handle: Handle) -> Result<DefaultKey, TableError> {
        if handle.table == self.id && self.chains.nodes.contains_key(handle.key) {
            Ok(handle.key)
        } else {
            Err(TableError::NotLinked)
        }
    }

    /// Number of buckets. Never changes.
    pub fn size(&self) -> usize {
        self.chains.buckets.len()
    }

    /// Number of linked entries.
    pub fn len(&self) -> usize {
        self.chains.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.nodes.is_empty()
    }

    /// Link `entry` at the head of its bucket's chain. Never rejects an entry,
    /// even when one with an equal key is already present.
    pub fn add(&mut self, entry: E) -> Handle {
        let _g = self.reentrancy.enter();
        let hash = entry.key_hash();
        let bucket = self.chains.bucket_index(hash);
        let k = self.chains.nodes.insert(Node {
            entry,
            hash,
            back: Back::Bucket(bucket as u32),
            next: None,
        });
        self.chains.link_front(bucket, k);
        log::trace!("add {:?} at head of bucket {}", k, bucket);
        self.handle(k)
    }

    /// First entry in the probe's chain that matches it. Leaves chain order
    /// untouched.
    pub fn find<Q: ?Sized + Probe<E>>(&self, probe: &Q) -> Option<Handle> {
        let _g = self.reentrancy.enter();
        self.chains.find(probe).map(|k| self.handle(k))
    }

    /// Like [`find`](Self::find), but a hit that is not already at the head of
    /// its chain is moved there, so repeatedly looked-up keys get cheaper.
    /// Nothing is ever evicted.
    pub fn find_cached<Q: ?Sized + Probe<E>>(&mut self, probe: &Q) -> Option<Handle> {
        let _g = self.reentrancy.enter();
        let k = self.chains.find(probe)?;
        if let Back::Node(_) = self.chains.nodes[k].back {
            let bucket = self.chains.bucket_index(self.chains.nodes[k].hash);
            self.chains.unlink(k);
            self.chains.link_front(bucket, k);
            log::trace!("promote {:?} to head of bucket {}", k, bucket);
        }
        Some(self.handle(k))
    }

    pub fn contains<Q: ?Sized + Probe<E>>(&self, probe: &Q) -> bool {
        self.find(probe).is_some()
    }

    pub fn get(&self, handle: Handle) -> Option<&E> {
        let k = self.resolve(handle).ok()?;
        self.chains.nodes.get(k).map(|n| &n.entry)
    }

    /// Unlink the entry in O(1) and hand it back to the caller.
    pub fn remove(&mut self, handle: Handle) -> Result<E, TableError> {
        let _g = self.reentrancy.enter();
        let k = self.resolve(handle)?;
        self.chains.unlink(k);
        let node = self.chains.nodes.remove(k).ok_or(TableError::NotLinked)?;
        log::trace!("remove {:?}", k);
        Ok(node.entry)
    }

    /// Continue a duplicate-key scan from a previous `find`/`next` result.
    ///
    /// Returns the entry directly after `previous` in its chain if its key
    /// equals `previous`'s key, and `None` otherwise. The scan therefore only
    /// sees duplicates that sit next to each other. Entries added back to
    /// back with equal keys do; an entry with a different but colliding key
    /// added in between, or a `find_cached` promotion, splits the run and
    /// hides the entries behind the split.
    pub fn next(&self, previous: Handle) -> Result<Option<Handle>, TableError> {
        let _g = self.reentrancy.enter();
        let k = self.resolve(previous)?;
        Ok(self.chains.next_match(k).map(|n| self.handle(n)))
    }

    /// Every entry reachable by `find` followed by repeated `next`.
    pub fn duplicates<'a, Q: ?Sized + Probe<E>>(&'a self, probe: &'a Q) -> Duplicates<'a, E, Q> {
        Duplicates {
            table: self,
            state: DupState::Start(probe),
        }
    }

    /// Drop every linked entry and reset all buckets. Outstanding handles
    /// stop resolving.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        let reclaimed = self.chains.nodes.len();
        self.chains.buckets.fill(None);
        self.chains.nodes.clear();
        log::debug!("chain table {} cleared, {} entries dropped", self.id.0, reclaimed);
    }

    /// Unlink every entry and yield them to the caller. The table is empty
    /// as soon as this returns, whether or not the iterator is consumed.
    /// Entries not consumed are dropped when the iterator is.
    pub fn drain(&mut self) -> impl Iterator<Item = E> + '_ {
        let _g = self.reentrancy.enter();
        // Slot map drain only removes what is pulled, so detach everything
        // up front. Generations survive, so old handles stay dead.
        let entries: Vec<E> = self.chains.nodes.drain().map(|(_, n)| n.entry).collect();
        self.chains.buckets.fill(None);
        log::debug!(
            "chain table {} drained, {} entries returned",
            self.id.0,
            entries.len()
        );
        entries.into_iter()
    }

    /// `size * 1000 / len`, or `None` for an empty table.
    pub fn load_factor(&self) -> Option<u64> {
        (self.size() as u64 * 1000).checked_div(self.len() as u64)
    }

    /// Bucket the probe hashes to.
    pub fn bucket_of<Q: ?Sized + Probe<E>>(&self, probe: &Q) -> usize {
        let _g = self.reentrancy.enter();
        self.chains.bucket_index(probe.probe_hash())
    }

    /// Entries of one bucket, head first. Empty for an out-of-range bucket.
    pub fn chain(&self, bucket: usize) -> Chain<'_, E> {
        Chain {
            nodes: &self.chains.nodes,
            table: self.id,
            cur: self.chains.buckets.get(bucket).copied().flatten(),
        }
    }

    /// All entries, bucket by bucket, each chain head first.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            buckets: &self.chains.buckets,
            chain: Chain {
                nodes: &self.chains.nodes,
                table: self.id,
                cur: None,
            },
        }
    }

    /// Diagnostic listing: one `[bucket] description` line per entry in
    /// traversal order. Not a stable format.
    pub fn dump(&self) -> Dump<'_, E> {
        Dump { table: self }
    }

    /// Walk every chain and verify the link invariants: each entry is reached
    /// exactly once, from the bucket its hash selects, and every back link
    /// names the bucket or node that actually points at it.
    pub fn check_links(&self) -> Result<(), TableError> {
        let nodes = &self.chains.nodes;
        let mut seen: HashSet<DefaultKey> = HashSet::with_capacity(nodes.len());
        for (bucket, &head) in self.chains.buckets.iter().enumerate() {
            let broken = |reason| TableError::BrokenLink { bucket, reason };
            let mut expected_back = Back::Bucket(bucket as u32);
            let mut cur = head;
            while let Some(k) = cur {
                let Some(node) = nodes.get(k) else {
                    return Err(broken("dangling link"));
                };
                if !seen.insert(k) {
                    return Err(broken("entry reachable twice"));
                }
                if node.back != expected_back {
                    return Err(broken("back link does not name its referrer"));
                }
                if self.chains.bucket_index(node.hash) != bucket {
                    return Err(broken("entry linked into the wrong bucket"));
                }
                expected_back = Back::Node(k);
                cur = node.next;
            }
        }
        if let Some((_, node)) = nodes.iter().find(|(k, _)| !seen.contains(k)) {
            return Err(TableError::BrokenLink {
                bucket: self.chains.bucket_index(node.hash),
                reason: "entry not reachable from any bucket",
            });
        }
        Ok(())
    }
}

impl<E: Entry> Default for ChainTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entry> fmt::Debug for ChainTable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainTable")
            .field("size", &self.size())
            .field("len", &self.len())
            .finish()
    }
}

impl<E: Entry> Extend<E> for ChainTable<E> {
    fn extend<I: IntoIterator<Item = E>>(&mut self, iter: I) {
        for entry in iter {
            self.add(entry);
        }
    }
}

impl<E: Entry> FromIterator<E> for ChainTable<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut table = Self::new();
        table.extend(iter);
        table
    }
}

/// Iterator over one chain.
pub struct Chain<'a, E> {
    nodes: &'a SlotMap<DefaultKey, Node<E>>,
    table: TableId,
    cur: Option<DefaultKey>,
}

impl<'a, E> Iterator for Chain<'a, E> {
    type Item = (Handle, &'a E);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cur?;
        let nodes = self.nodes;
        let node = &nodes[k];
        self.cur = node.next;
        Some((
            Handle {
                key: k,
                table: self.table,
            },
            &node.entry,
        ))
    }
}

/// Iterator over every entry of a table.
pub struct Iter<'a, E> {
    buckets: &'a [Option<DefaultKey>],
    chain: Chain<'a, E>,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = (Handle, &'a E);
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.chain.next() {
                return Some(item);
            }
            let (&head, rest) = self.buckets.split_first()?;
            self.buckets = rest;
            self.chain.cur = head;
        }
    }
}

enum DupState<'a, Q: ?Sized> {
    Start(&'a Q),
    At(DefaultKey),
    Done,
}

/// Iterator returned by [`ChainTable::duplicates`].
pub struct Duplicates<'a, E, Q: ?Sized> {
    table: &'a ChainTable<E>,
    state: DupState<'a, Q>,
}

impl<'a, E: Entry, Q: ?Sized + Probe<E>> Iterator for Duplicates<'a, E, Q> {
    type Item = (Handle, &'a E);
    fn next(&mut self) -> Option<Self::Item> {
        let table = self.table;
        let found = {
            let _g = table.reentrancy.enter();
            match self.state {
                DupState::Start(probe) => table.chains.find(probe),
                DupState::At(k) => table.chains.next_match(k),
                DupState::Done => None,
            }
        };
        match found {
            Some(k) => {
                self.state = DupState::At(k);
                Some((table.handle(k), &table.chains.nodes[k].entry))
            }
            None => {
                self.state = DupState::Done;
                None
            }
        }
    }
}

/// Display adapter returned by [`ChainTable::dump`].
pub struct Dump<'a, E> {
    table: &'a ChainTable<E>,
}

impl<E: Entry> fmt::Display for Dump<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let _g = self.table.reentrancy.enter();
        for bucket in 0..self.table.size() {
            for (_, entry) in self.table.chain(bucket) {
                writeln!(f, "[{}] {}", bucket, Describe(entry))?;
            }
        }
        Ok(())
    }
}
