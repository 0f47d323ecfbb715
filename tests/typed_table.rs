// TypedTable and erased-entry integration tests.
//
// A resource registry keeps textures and fonts in one erased table keyed by
// name, and also hands out a typed table for a single resource kind.
use chain_table::{
    downcast_ref, key_hash, ChainTable, Entry, ErasedEntry, Probe, TableError, TypedTable,
};
use std::fmt;

#[derive(Debug, PartialEq)]
struct Texture {
    name: &'static str,
    width: u32,
}

#[derive(Debug, PartialEq)]
struct Font {
    name: &'static str,
    size: u32,
}

impl Entry for Texture {
    fn key_hash(&self) -> u64 {
        key_hash(self.name)
    }
    fn key_eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture {} ({}px)", self.name, self.width)
    }
}

impl Entry for Font {
    fn key_hash(&self) -> u64 {
        key_hash(self.name)
    }
    fn key_eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
    fn describe(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "font {} ({}pt)", self.name, self.size)
    }
}

struct ByName<'a>(&'a str);

impl Probe<Texture> for ByName<'_> {
    fn probe_hash(&self) -> u64 {
        key_hash(self.0)
    }
    fn matches(&self, entry: &Texture) -> bool {
        entry.name == self.0
    }
}

// Test: erased table with two entry types sharing a name.
// Verifies: a probe of one type never matches the other type, so both can be
// found independently even though they hash identically.
#[test]
fn erased_table_keeps_types_apart() {
    let mut t: ChainTable<ErasedEntry> = ChainTable::with_capacity(1).unwrap();
    t.add(Box::new(Texture {
        name: "ui",
        width: 64,
    }));
    t.add(Box::new(Font {
        name: "ui",
        size: 12,
    }));

    let font_probe: ErasedEntry = Box::new(Font { name: "ui", size: 0 });
    let tex_probe: ErasedEntry = Box::new(Texture { name: "ui", width: 0 });
    let hf = t.find(&font_probe).unwrap();
    let ht = t.find(&tex_probe).unwrap();
    assert_ne!(hf, ht);

    let font = t.get(hf).and_then(downcast_ref::<Font>);
    assert_eq!(font, Some(&Font { name: "ui", size: 12 }));
    assert_eq!(
        t.dump().to_string(),
        "[0] font ui (12pt)\n[0] texture ui (64px)\n"
    );
    t.check_links().unwrap();
}

// Test: the typed view narrows every result to the concrete type.
// Verifies: find/get/remove/iter/drain all yield `Texture`.
#[test]
fn typed_view_narrows_results() {
    let mut t: TypedTable<Texture> = TypedTable::new();
    let grass = t.add(Texture {
        name: "grass",
        width: 16,
    });
    t.add(Texture {
        name: "stone",
        width: 32,
    });

    assert_eq!(t.find(&ByName("grass")), Some(grass));
    assert_eq!(t.get(grass).map(|e| e.width), Some(16));
    let mut widths: Vec<u32> = t.iter().map(|(_, e)| e.width).collect();
    widths.sort_unstable();
    assert_eq!(widths, vec![16, 32]);

    assert_eq!(
        t.remove(grass),
        Ok(Texture {
            name: "grass",
            width: 16
        })
    );
    assert_eq!(t.remove(grass), Err(TableError::NotLinked));

    let rest: Vec<Texture> = t.drain().collect();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name, "stone");
    assert!(t.is_empty());
    assert_eq!(t.load_factor(), None);
}

// Test: a typed table converts back to its erased base without losing links.
#[test]
fn typed_view_exposes_erased_base() {
    let mut t = TypedTable::with_capacity(3).unwrap();
    t.add(Texture { name: "a", width: 1 });
    t.add(Texture { name: "a", width: 2 });
    assert_eq!(t.as_erased().len(), 2);
    assert_eq!(t.size(), 3);

    let widths: Vec<u32> = t.duplicates(&ByName("a")).map(|(_, e)| e.width).collect();
    assert_eq!(widths, vec![2, 1]);

    let erased = t.into_erased();
    assert_eq!(erased.len(), 2);
    erased.check_links().unwrap();
}
