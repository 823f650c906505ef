use ordstat::{ordset, OrdMultiset, OrdSet};

fn rank(_k: &i32) -> [i64; 1] {
    [1]
}

#[test]
fn basic_set_functionality() {
    let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);

    assert!(s.is_empty());

    for k in 1..=5 {
        s.insert(k).unwrap();
    }

    assert!(!s.is_empty());
    assert_eq!(s.len(), 5);

    for k in 1..=5 {
        assert!(s.contains(&k));
    }

    s.remove(&3).unwrap();

    assert_eq!(s.iter().copied().collect::<Vec<i32>>(), vec![1, 2, 4, 5]);

    let val = s.pop_first().unwrap().unwrap();
    assert_eq!(val, 1);
    assert_eq!(s.iter().copied().collect::<Vec<i32>>(), vec![2, 4, 5]);

    let val = s.pop_last().unwrap().unwrap();
    assert_eq!(val, 5);
    assert_eq!(s.iter().copied().collect::<Vec<i32>>(), vec![2, 4]);
}

#[test]
fn duplicate_insert_rejected_for_unique_set() {
    let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);
    assert!(s.insert(10).unwrap());
    assert!(!s.insert(10).unwrap());
    assert_eq!(s.len(), 1);
}

#[test]
fn multiset_allows_duplicates() {
    let mut s: OrdMultiset<i32, i64, 1, _, _> = OrdMultiset::new(rank);
    for _ in 0..3 {
        s.insert(10).unwrap();
    }
    assert_eq!(s.count(&10), 3);
    assert_eq!(s.len(), 3);
}

#[test]
fn retain_keeps_matching_entries_only() {
    let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);
    for k in 0..10 {
        s.insert(k).unwrap();
    }
    s.retain(|k| k % 2 == 0).unwrap();
    assert_eq!(s.iter().copied().collect::<Vec<i32>>(), vec![0, 2, 4, 6, 8]);
}

#[test]
fn append_drains_other_into_self() {
    let mut a: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);
    let mut b: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);
    for k in [1, 3, 5] {
        a.insert(k).unwrap();
    }
    for k in [2, 4, 6] {
        b.insert(k).unwrap();
    }
    a.append(&mut b).unwrap();
    assert!(b.is_empty());
    assert_eq!(a.iter().copied().collect::<Vec<i32>>(), vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn ordset_macro_builds_and_checks() {
    let s = ordset! {
        rank as fn(&i32) -> [i64; 1],
        1,
        2,
        3,
        2,
    };
    assert_eq!(s.len(), 3);
    s.check(Some(0)).unwrap();
}

#[test]
fn partial_sums_match_rank_for_weight_one() {
    let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(rank);
    for k in [10, 20, 30, 40] {
        s.insert(k).unwrap();
    }
    assert_eq!(s.sum_before(&30).unwrap(), [2]);
    assert_eq!(s.total_sum(), [4]);
}

#[test]
fn multiset_compact_constructors() {
    let mut s: OrdMultiset<i32, i64, 1, _, _> = OrdMultiset::new_compact(rank);
    for k in [1, 1, 2] {
        s.insert(k).unwrap();
    }
    s.check(Some(0)).unwrap();
    assert_eq!(s.count(&1), 2);
}
