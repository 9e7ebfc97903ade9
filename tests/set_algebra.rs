//! Randomized checks of the cursor algebra against roaring bitmaps

use quarry::cursor::{collect_ids, AndCursor, BoxCursor, Cursor, NotCursor, OrCursor};
use quarry::{PostingStore, MAX_ID};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use roaring::RoaringBitmap;

const TERMS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

struct Fixture {
    store: PostingStore,
    sets: Vec<RoaringBitmap>,
}

fn fixture(seed: u64) -> Fixture {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = PostingStore::new();
    let mut sets = Vec::new();
    for (i, term) in TERMS.iter().enumerate() {
        let mut set = RoaringBitmap::new();
        // dense low range plus sparse ids spread over many groups
        let dense = 200 * (i as u32 + 1);
        for _ in 0..dense {
            set.insert(rng.gen_range(1..5_000));
        }
        for _ in 0..300 {
            set.insert(rng.gen_range(1..=MAX_ID));
        }
        for id in &set {
            store.insert(term, id, &[i as u8]).unwrap();
        }
        sets.push(set);
    }
    Fixture { store, sets }
}

fn term<'a>(store: &'a PostingStore, i: usize) -> BoxCursor<'a> {
    Box::new(store.term_cursor(TERMS[i]).unwrap())
}

fn bits(ids: Vec<u32>) -> RoaringBitmap {
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids must be strictly increasing");
    ids.into_iter().collect()
}

#[test]
fn test_and_matches_intersection() {
    for seed in 0..5 {
        let f = fixture(seed);
        let cursor = AndCursor::from_cursors(vec![term(&f.store, 0), term(&f.store, 1), term(&f.store, 2)]);
        let expected = &(&f.sets[0] & &f.sets[1]) & &f.sets[2];
        assert_eq!(bits(collect_ids(cursor)), expected, "seed {}", seed);
    }
}

#[test]
fn test_or_matches_union() {
    for seed in 0..5 {
        let f = fixture(seed);
        let cursor = OrCursor::from_cursors((0..4).map(|i| term(&f.store, i)).collect());
        let expected = &(&(&f.sets[0] | &f.sets[1]) | &f.sets[2]) | &f.sets[3];
        assert_eq!(bits(collect_ids(cursor)), expected, "seed {}", seed);
    }
}

#[test]
fn test_not_matches_difference() {
    for seed in 0..5 {
        let f = fixture(seed);
        let negative = OrCursor::from_cursors(vec![term(&f.store, 1), term(&f.store, 2)]);
        let cursor = NotCursor::new(term(&f.store, 3), Box::new(negative));
        let expected = &f.sets[3] - &(&f.sets[1] | &f.sets[2]);
        assert_eq!(bits(collect_ids(cursor)), expected, "seed {}", seed);
    }
}

#[test]
fn test_advance_to_agrees_with_bitmap() {
    let f = fixture(42);
    let mut rng = StdRng::seed_from_u64(7);
    let expected = &f.sets[0] | &f.sets[3];
    let mut cursor = OrCursor::from_cursors(vec![term(&f.store, 0), term(&f.store, 3)]);

    let mut target = 1;
    while target <= MAX_ID {
        let got = cursor.advance_to(target);
        let want = expected.iter().find(|&id| id >= target).unwrap_or(0);
        assert_eq!(got, want, "advance_to({})", target);
        if got == 0 {
            break;
        }
        target = got + rng.gen_range(1..50_000);
    }
    while cursor.advance() != 0 {}
    // exhausted cursors stay exhausted
    assert_eq!(cursor.advance(), 0);
    assert_eq!(cursor.advance_to(1), 0);
}
