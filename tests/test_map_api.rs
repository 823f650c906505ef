use ordstat::{ordmap, OrdMap, OrdMultimap};

fn value_weight(_k: &i32, v: &i32) -> [i64; 1] {
    [*v as i64]
}

#[test]
fn basic_map_functionality() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);

    assert!(m.is_empty());
    for (k, v) in [(1, 10), (2, 20), (3, 30)] {
        assert!(m.insert(k, v).unwrap().is_none());
    }
    assert_eq!(m.len(), 3);
    assert_eq!(m[&2], 20);
    assert_eq!(*m.at(&2).unwrap(), 20);
    assert!(m.at(&99).is_err());

    let old = m.insert(2, 21).unwrap();
    assert_eq!(old, Some(20));
    assert_eq!(m.len(), 3);
}

#[test]
fn remove_and_key_value_pairs() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    for (k, v) in [(1, 10), (2, 20), (3, 30)] {
        m.insert(k, v).unwrap();
    }
    assert_eq!(m.first_key_value(), Some((&1, &10)));
    assert_eq!(m.last_key_value(), Some((&3, &30)));

    m.remove(&2).unwrap();
    assert!(!m.contains_key(&2));
    assert_eq!(m.len(), 2);

    let (k, v) = m.pop_first().unwrap().unwrap();
    assert_eq!((k, v), (1, 10));
}

#[test]
fn multimap_keeps_every_value() {
    let mut mm: OrdMultimap<i32, i32, i64, 1, _, _> = OrdMultimap::new(value_weight);
    for v in [1, 2, 3] {
        mm.insert(5, v).unwrap();
    }
    assert_eq!(mm.count(&5), 3);
}

#[test]
fn retain_and_append() {
    let mut a: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    let mut b: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    for k in 0..6 {
        a.insert(k, k * 10).unwrap();
    }
    a.retain(|k, _v| k % 2 == 0).unwrap();
    assert_eq!(
        a.iter().map(|(k, _)| *k).collect::<Vec<i32>>(),
        vec![0, 2, 4]
    );

    b.insert(100, 1).unwrap();
    a.append(&mut b).unwrap();
    assert!(b.is_empty());
    assert!(a.contains_key(&100));
}

#[test]
fn entry_or_insert_initializes_missing_keys() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    m.entry_or_insert_with(1, 0, |v| *v += 5).unwrap();
    m.entry_or_insert_with(1, 0, |v| *v += 5).unwrap();
    assert_eq!(m[&1], 10);
    m.check(Some(0)).unwrap();
}

#[test]
fn bounds_and_equal_range() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    for k in [10, 20, 30, 40] {
        m.insert(k, k * 10).unwrap();
    }
    assert_eq!(m.lower_bound(&25), Some((&30, &300)));
    assert_eq!(m.upper_bound(&30), Some((&40, &400)));
    assert_eq!(
        m.equal_range(&30).collect::<Vec<_>>(),
        vec![(&30, &300)]
    );
    assert!(m.equal_range(&25).next().is_none());

    let mut mm: OrdMultimap<i32, i32, i64, 1, _, _> = OrdMultimap::new(value_weight);
    for v in [1, 2, 3] {
        mm.insert(5, v).unwrap();
    }
    mm.insert(6, 100).unwrap();
    assert_eq!(
        mm.equal_range(&5).map(|(_, v)| *v).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
}

#[test]
fn extend_and_erase_range() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    m.extend([(1, 10), (3, 30), (2, 20), (5, 50), (4, 40)])
        .unwrap();
    m.check(Some(0)).unwrap();
    assert_eq!(m.len(), 5);

    let removed = m.erase_range(&2, &5).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(
        m.iter().map(|(k, _)| *k).collect::<Vec<i32>>(),
        vec![1, 5]
    );
    m.check(Some(0)).unwrap();
}

#[test]
fn into_iter_drains_in_sorted_order() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(value_weight);
    for k in [3, 1, 4, 1, 5, 9, 2, 6] {
        m.insert(k, k * 10).unwrap();
    }
    let collected: Vec<(i32, i32)> = m.into_iter().collect();
    let mut expected = collected.clone();
    expected.sort_unstable_by_key(|(k, _)| *k);
    assert_eq!(collected, expected);
    assert_eq!(collected.len(), 7);
}

#[test]
fn compact_constructors_for_all_flavors() {
    let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new_compact(value_weight);
    m.insert(1, 10).unwrap();
    m.check(Some(0)).unwrap();

    let mut m2: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new_compact_stacked(value_weight);
    m2.insert(1, 10).unwrap();
    m2.check(Some(0)).unwrap();

    let mut mm: OrdMultimap<i32, i32, i64, 1, _, _> = OrdMultimap::new_compact(value_weight);
    mm.insert(1, 10).unwrap();
    mm.insert(1, 20).unwrap();
    mm.check(Some(0)).unwrap();

    let mut mm2: OrdMultimap<i32, i32, i64, 1, _, _> =
        OrdMultimap::new_compact_stacked(value_weight);
    mm2.insert(1, 10).unwrap();
    mm2.check(Some(0)).unwrap();
    mm2.shrink_to_fit();
    assert!(mm2.arena_len() >= mm2.len());
}

#[test]
fn ordmap_macro_builds_and_checks() {
    let m = ordmap! {
        value_weight as fn(&i32, &i32) -> [i64; 1],
        1 => 10,
        2 => 20,
        3 => 30,
    };
    assert_eq!(m.len(), 3);
    m.check(Some(0)).unwrap();
}
