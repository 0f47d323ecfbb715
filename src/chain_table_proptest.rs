#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can check
// internal link invariants after every step.

use crate::chain_table::{ChainTable, Handle};
use crate::entry::{key_hash, Entry, Probe};
use crate::error::TableError;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Tok {
    key: String,
    tag: u32,
}

impl Entry for Tok {
    fn key_hash(&self) -> u64 {
        key_hash(self.key.as_str())
    }
    fn key_eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.key, self.tag)
    }
}

impl Probe<Tok> for str {
    fn probe_hash(&self) -> u64 {
        key_hash(self)
    }
    fn matches(&self, entry: &Tok) -> bool {
        entry.key == self
    }
}

// Pool-indexed operations: indices shrink toward earlier keys and live
// entries, op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Add(usize),
    Remove(usize),
    RemoveThenAdd(usize),
    Find(usize),
    FindCached(usize),
    Duplicates(usize),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-c]{0,2}", 1..=6).prop_flat_map(|pool| {
        let idx = proptest::sample::select((0..pool.len()).collect::<Vec<_>>());
        let op = prop_oneof![
            4 => idx.clone().prop_map(Op::Add),
            2 => any::<usize>().prop_map(Op::Remove),
            1 => any::<usize>().prop_map(Op::RemoveThenAdd),
            2 => idx.clone().prop_map(Op::Find),
            2 => idx.clone().prop_map(Op::FindCached),
            1 => idx.prop_map(Op::Duplicates),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn multiset(table: &ChainTable<Tok>) -> BTreeMap<(String, u32), usize> {
    let mut m = BTreeMap::new();
    for (_, e) in table.iter() {
        *m.entry((e.key.clone(), e.tag)).or_insert(0) += 1;
    }
    m
}

fn run(capacity: usize, pool: Vec<String>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut sut: ChainTable<Tok> = ChainTable::with_capacity(capacity).unwrap();
    // Model: handle -> entry for every live entry.
    let mut live: Vec<(Handle, Tok)> = Vec::new();
    let mut stale: Vec<Handle> = Vec::new();
    let mut next_tag = 0u32;

    for op in ops {
        match op {
            Op::Add(i) => {
                let tok = Tok {
                    key: pool[i].clone(),
                    tag: next_tag,
                };
                next_tag += 1;
                let h = sut.add(tok.clone());
                prop_assert_eq!(sut.get(h), Some(&tok));
                // Reflexivity: the new entry's key is findable.
                let found = sut.find(&tok).expect("added entry must be findable");
                prop_assert_eq!(&sut.get(found).unwrap().key, &tok.key);
                live.push((h, tok));
            }
            Op::Remove(n) => {
                if live.is_empty() {
                    continue;
                }
                let (h, tok) = live.swap_remove(n % live.len());
                prop_assert_eq!(sut.remove(h), Ok(tok));
                prop_assert_eq!(sut.remove(h), Err(TableError::NotLinked));
                stale.push(h);
            }
            Op::RemoveThenAdd(n) => {
                if live.is_empty() {
                    continue;
                }
                let before = multiset(&sut);
                let (h, _) = live.swap_remove(n % live.len());
                let tok = sut.remove(h).expect("live handle");
                stale.push(h);
                let h2 = sut.add(tok.clone());
                live.push((h2, tok));
                prop_assert_eq!(multiset(&sut), before);
            }
            Op::Find(i) => {
                let key = pool[i].as_str();
                let present = live.iter().any(|(_, t)| t.key == key);
                let found = sut.find(key);
                prop_assert_eq!(found.is_some(), present);
                if let Some(h) = found {
                    prop_assert_eq!(sut.get(h).map(|t| t.key.as_str()), Some(key));
                }
            }
            Op::FindCached(i) => {
                let key = pool[i].as_str();
                let plain = sut.find(key);
                let cached = sut.find_cached(key);
                prop_assert_eq!(plain, cached);
                if let Some(h) = cached {
                    let head = sut.chain(sut.bucket_of(key)).next().map(|(hh, _)| hh);
                    prop_assert_eq!(head, Some(h));
                }
            }
            Op::Duplicates(i) => {
                let key = pool[i].as_str();
                let total = live.iter().filter(|(_, t)| t.key == key).count();
                let seen: Vec<Handle> = sut.duplicates(key).map(|(h, _)| h).collect();
                let unique: HashSet<Handle> = seen.iter().copied().collect();
                prop_assert_eq!(unique.len(), seen.len(), "no entry visited twice");
                prop_assert!(seen.len() <= total);
                prop_assert_eq!(seen.is_empty(), total == 0);
                for h in seen {
                    prop_assert_eq!(sut.get(h).map(|t| t.key.as_str()), Some(key));
                }
            }
            Op::Clear => {
                sut.clear();
                stale.extend(live.drain(..).map(|(h, _)| h));
            }
        }

        // Post-conditions after each op
        sut.check_links().map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(sut.len(), live.len());
        prop_assert_eq!(sut.is_empty(), live.is_empty());
        for &h in &stale {
            prop_assert!(sut.get(h).is_none());
        }
        for (h, tok) in &live {
            prop_assert_eq!(sut.get(*h), Some(tok));
        }
        prop_assert_eq!(sut.load_factor().is_none(), live.is_empty());
    }
    Ok(())
}

// Property: state-machine equivalence against a handle/entry list. Exercises
// reflexivity of add/find, count parity, remove-then-add membership,
// find_cached parity with find plus the move-to-front postcondition, and
// duplicate scans visiting each entry at most once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run(0, pool, ops)?;
    }
}

// Property: same invariants with a single bucket, so every entry collides
// and every operation works on one long chain.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_single_bucket((pool, ops) in arb_scenario()) {
        run(1, pool, ops)?;
    }
}
