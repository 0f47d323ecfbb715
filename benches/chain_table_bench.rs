use chain_table::{key_hash, ChainTable, Entry, Handle, Probe};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::fmt;
use std::time::Duration;

struct Sym {
    name: String,
    value: u64,
}

impl Entry for Sym {
    fn key_hash(&self) -> u64 {
        key_hash(self.name.as_str())
    }
    fn key_eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

impl Probe<Sym> for str {
    fn probe_hash(&self) -> u64 {
        key_hash(self)
    }
    fn matches(&self, entry: &Sym) -> bool {
        entry.name == self
    }
}

// xorshift64 stream; seeds must be non-zero.
fn xorshift(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        Some(s)
    })
}

// Identifier-like name such as `tex_q4m7z2`, the shape a symbol table sees.
fn symbol(n: u64) -> String {
    const PREFIXES: [&str; 4] = ["tex_", "fn_", "var_", "mod_"];
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut name = String::from(PREFIXES[(n % 4) as usize]);
    let mut rest = n >> 2;
    for _ in 0..6 {
        name.push(ALPHABET[(rest % 36) as usize] as char);
        rest /= 36;
    }
    name
}

// 10k entries over the default 127 buckets: chains average ~80 entries, so
// move-to-front has something to win.
const ENTRIES: usize = 10_000;

fn filled(seed: u64) -> (ChainTable<Sym>, Vec<String>) {
    let mut t = ChainTable::new();
    let keys: Vec<String> = xorshift(seed).take(ENTRIES).map(symbol).collect();
    for (i, k) in keys.iter().enumerate() {
        t.add(Sym {
            name: k.clone(),
            value: i as u64,
        });
    }
    (t, keys)
}

// Skewed query stream: 90% of lookups hit 1% of the keys.
fn skewed_queries(keys: &[String], n: usize) -> Vec<String> {
    let hot = keys.len() / 100;
    let mut s = 0x9e3779b97f4a7c15u64;
    (0..n)
        .map(|i| {
            s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
            let idx = if i % 10 == 0 {
                (s as usize) % keys.len()
            } else {
                (s as usize) % hot
            };
            keys[idx].clone()
        })
        .collect()
}

fn bench_add(c: &mut Criterion) {
    c.bench_function("chain::add_10k", |b| {
        b.iter_batched(
            || xorshift(1).take(ENTRIES).map(symbol).collect::<Vec<_>>(),
            |keys| {
                let mut t = ChainTable::new();
                for (i, k) in keys.into_iter().enumerate() {
                    t.add(Sym {
                        name: k,
                        value: i as u64,
                    });
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_vs_find_cached(c: &mut Criterion) {
    let (t, keys) = filled(7);
    let queries = skewed_queries(&keys, 10_000);
    c.bench_function("chain::find_skewed_10k", |b| {
        b.iter(|| {
            for q in &queries {
                black_box(t.find(q.as_str()));
            }
        })
    });

    c.bench_function("chain::find_cached_skewed_10k", |b| {
        b.iter_batched(
            || filled(7).0,
            |mut t| {
                for q in &queries {
                    black_box(t.find_cached(q.as_str()));
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_miss(c: &mut Criterion) {
    let (t, _) = filled(11);
    c.bench_function("chain::find_miss_10k", |b| {
        let mut miss = xorshift(0xdead_beef);
        b.iter(|| {
            for _ in 0..10_000 {
                let k = format!("miss_{}", symbol(miss.next().unwrap_or_default()));
                black_box(t.find(k.as_str()));
            }
        })
    });
}

fn bench_remove(c: &mut Criterion) {
    c.bench_function("chain::remove_all_10k", |b| {
        b.iter_batched(
            || {
                let (t, _) = filled(5);
                let handles: Vec<Handle> = t.iter().map(|(h, _)| h).collect();
                (t, handles)
            },
            |(mut t, handles)| {
                for h in handles {
                    let _ = black_box(t.remove(h));
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_build;
    config = bench_config();
    targets = bench_add, bench_remove
}
criterion_group! {
    name = benches_lookup;
    config = bench_config();
    targets = bench_find_vs_find_cached, bench_find_miss
}
criterion_main!(benches_build, benches_lookup);
