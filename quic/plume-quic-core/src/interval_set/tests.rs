// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use alloc::{collections::BTreeSet, format, vec::Vec};
use bolero::{check, generator::*};

fn t() -> Timestamp {
    Timestamp::from_nanos(42)
}

fn bounds(set: &IntervalSet) -> Vec<(u64, u64)> {
    set.iter().map(|iv| (iv.lo, iv.hi)).collect()
}

#[test]
fn merge_adjacent_singletons() {
    let mut set = IntervalSet::new();

    set.insert(5, t());
    assert_eq!(bounds(&set), [(5, 5)]);

    set.insert(7, t());
    assert_eq!(bounds(&set), [(5, 5), (7, 7)]);

    // closes the gap into a single interval
    let merged = set.insert(6, t());
    assert_eq!(bounds(&set), [(5, 7)]);
    assert_eq!((merged.lo, merged.hi), (5, 7));
    assert_eq!(set.count(), 3);
    assert_eq!(set.interval_len(), 1);
}

#[test]
fn insert_is_idempotent() {
    let mut set = IntervalSet::new();
    set.insert(10, t());
    set.insert(11, t());

    let stamp = Timestamp::from_nanos(99);
    let iv = set.insert(10, stamp);
    assert_eq!(bounds(&set), [(10, 11)]);
    // a re-insert refreshes the interval timestamp
    assert_eq!(iv.touched, stamp);
    assert_eq!(set.find(11).unwrap().touched, stamp);
}

#[test]
fn insert_then_remove_restores_set() {
    let mut set = IntervalSet::new();
    for n in [1u64, 2, 3, 9, 10, 20] {
        set.insert(n, t());
    }
    let before = bounds(&set);

    set.insert(15, t());
    set.remove(15);
    assert_eq!(bounds(&set), before);

    // removing an absent value is a no-op
    set.remove(15);
    assert_eq!(bounds(&set), before);
}

#[test]
fn remove_interior_splits() {
    let mut set = IntervalSet::new();
    set.insert_range(3, 9, t());

    set.remove(6);
    assert_eq!(bounds(&set), [(3, 5), (7, 9)]);
    assert_eq!(set.count(), 6);

    // boundary removals shrink
    set.remove(3);
    set.remove(9);
    assert_eq!(bounds(&set), [(4, 5), (7, 8)]);

    // singleton removal deletes
    set.remove(4);
    set.remove(5);
    assert_eq!(bounds(&set), [(7, 8)]);
}

#[test]
fn remove_range_trims_overlaps() {
    let mut set = IntervalSet::new();
    set.insert_range(0, 3, t());
    set.insert_range(6, 9, t());
    set.insert_range(12, 15, t());

    set.remove_range(2, 13);
    assert_eq!(bounds(&set), [(0, 1), (14, 15)]);

    // interior removal of a single interval splits it
    let mut set = IntervalSet::new();
    set.insert_range(0, 10, t());
    set.remove_range(4, 6);
    assert_eq!(bounds(&set), [(0, 3), (7, 10)]);
}

#[test]
fn insertion_order_is_irrelevant() {
    let ascending: Vec<u64> = (100..120).collect();
    let mut expected = IntervalSet::new();
    for &n in &ascending {
        expected.insert(n, t());
    }
    assert_eq!(expected.interval_len(), 1);

    let mut shuffled = ascending.clone();
    // deterministic shuffle; any permutation must produce the same set
    shuffled.reverse();
    shuffled.swap(0, 7);
    shuffled.swap(3, 19);

    let mut actual = IntervalSet::new();
    for &n in &shuffled {
        actual.insert(n, t());
    }
    assert_eq!(bounds(&expected), bounds(&actual));
}

#[test]
fn min_max_count() {
    let mut set = IntervalSet::new();
    assert_eq!(set.min(), None);
    assert_eq!(set.max(), None);
    assert_eq!(set.count(), 0);
    assert!(set.is_empty());

    set.insert_range(4, 6, t());
    set.insert(9, t());
    assert_eq!(set.min(), Some(4));
    assert_eq!(set.max(), Some(9));
    assert_eq!(set.count(), 4);
    assert!(!set.is_empty());

    set.clear();
    assert!(set.is_empty());
}

#[test]
fn display_renders_ranges_and_singletons() {
    let mut set = IntervalSet::new();
    assert_eq!(format!("{set}"), "");

    set.insert_range(1, 3, t());
    set.insert(5, t());
    set.insert_range(7, 8, t());
    assert_eq!(format!("{set}"), "1..3, 5, 7..8");
}

#[test]
fn find_reports_containing_interval() {
    let mut set = IntervalSet::new();
    set.insert_range(10, 12, t());

    assert_eq!(set.find(9), None);
    assert_eq!(set.find(13), None);
    for n in 10..=12 {
        let iv = set.find(n).unwrap();
        assert_eq!((iv.lo, iv.hi), (10, 12));
        assert!(set.contains(n));
    }
}

#[derive(Clone, Copy, Debug, TypeGenerator)]
enum Operation {
    Insert(u8),
    InsertRange(u8, u8),
    Remove(u8),
    RemoveRange(u8, u8),
}

/// Drives the set and a `BTreeSet` oracle with the same operations and
/// asserts equivalence after every step.
#[test]
#[cfg_attr(miri, ignore)] // too expensive for miri
fn oracle_equivalence() {
    check!()
        .with_type::<Vec<Operation>>()
        .for_each(|operations| {
            let mut oracle: BTreeSet<u64> = BTreeSet::new();
            let mut subject = IntervalSet::new();

            for op in operations {
                match *op {
                    Operation::Insert(n) => {
                        oracle.insert(n as u64);
                        subject.insert(n as u64, t());
                    }
                    Operation::InsertRange(a, b) => {
                        let (lo, hi) = (a.min(b) as u64, a.max(b) as u64);
                        oracle.extend(lo..=hi);
                        subject.insert_range(lo, hi, t());
                    }
                    Operation::Remove(n) => {
                        oracle.remove(&(n as u64));
                        subject.remove(n as u64);
                    }
                    Operation::RemoveRange(a, b) => {
                        let (lo, hi) = (a.min(b) as u64, a.max(b) as u64);
                        for n in lo..=hi {
                            oracle.remove(&n);
                        }
                        subject.remove_range(lo, hi);
                    }
                }

                let expected: Vec<u64> = oracle.iter().copied().collect();
                let actual: Vec<u64> = subject
                    .iter()
                    .flat_map(|iv| iv.lo..=iv.hi)
                    .collect();
                assert_eq!(expected, actual);
                assert_eq!(oracle.len() as u64, subject.count());
            }
        });
}
