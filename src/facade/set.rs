use crate::backend::{Allocator, CompactAllocRealloc, CompactAllocStacked, PtrAlloc};
use crate::error::Error;
use crate::reloc::Relocatable;
use crate::tree::{IntoIter, Iter, Multi, Tree, Unique};
use crate::weight::{Weight, WeightFn};

/// Adapts a set's key-only weight closure `Fn(&K) -> [W; D]` into the
/// `WeightFn<K, (), W, D>` `Tree` requires, since entries in a set carry no
/// value. A concrete wrapper type rather than a blanket `Fn` impl because
/// stable Rust cannot implement the built-in `Fn` traits for a custom type.
pub struct SetWeight<F>(F);

impl<K, W: Weight, const D: usize, F> WeightFn<K, (), W, D> for SetWeight<F>
where
    F: Fn(&K) -> [W; D],
{
    fn weight(&self, key: &K, _val: &()) -> [W; D] {
        (self.0)(key)
    }
}

macro_rules! define_set_facade {
    ($name:ident, $policy:ty, $doc:expr) => {
        #[doc = $doc]
        pub struct $name<K, W, const D: usize, A, F>
        where
            A: Allocator<K, (), W, D>,
            W: Weight,
            F: Fn(&K) -> [W; D],
        {
            tree: Tree<K, (), W, D, A, SetWeight<F>, $policy>,
        }

        impl<K, W, const D: usize, A, F> $name<K, W, D, A, F>
        where
            A: Allocator<K, (), W, D>,
            W: Weight,
            F: Fn(&K) -> [W; D],
        {
            pub fn with_allocator(alloc: A, weight_fn: F) -> Self {
                $name {
                    tree: Tree::new(alloc, SetWeight(weight_fn)),
                }
            }

            pub fn len(&self) -> usize {
                self.tree.len()
            }

            pub fn is_empty(&self) -> bool {
                self.tree.is_empty()
            }

            pub fn clear(&mut self) {
                self.tree.clear();
            }

            pub fn contains(&self, key: &K) -> bool
            where
                K: Ord,
            {
                self.tree.find(key).is_some()
            }

            pub fn count(&self, key: &K) -> usize
            where
                K: Ord,
            {
                self.tree.count(key)
            }

            pub fn insert(&mut self, key: K) -> Result<bool, Error>
            where
                K: Ord,
            {
                let (_, inserted) = self.tree.insert(key, ())?;
                Ok(inserted)
            }

            /// Alias of [`insert`][Self::insert]: every insert here is
            /// already fallible, so there is no separate throwing form to
            /// distinguish it from (see `DESIGN.md`).
            pub fn try_insert(&mut self, key: K) -> Result<bool, Error>
            where
                K: Ord,
            {
                self.insert(key)
            }

            /// Move every entry out of `other` and into `self`.
            pub fn append(&mut self, other: &mut Self) -> Result<(), Error>
            where
                K: Ord + Clone,
            {
                while let Some(k) = other.pop_first()? {
                    self.insert(k)?;
                }
                Ok(())
            }

            /// Removes every entry equal to `key`, returning how many were
            /// removed (0 or 1 for a unique set; any count for a multiset).
            pub fn remove(&mut self, key: &K) -> Result<usize, Error>
            where
                K: Ord,
            {
                self.tree.erase_key(key)
            }

            pub fn first(&self) -> Option<&K>
            where
                K: Ord,
            {
                self.tree.first().map(|h| self.tree.key(h))
            }

            pub fn last(&self) -> Option<&K>
            where
                K: Ord,
            {
                self.tree.last().map(|h| self.tree.key(h))
            }

            /// Removes and returns the smallest key, if any.
            pub fn pop_first(&mut self) -> Result<Option<K>, Error>
            where
                K: Ord + Clone,
            {
                match self.tree.first() {
                    Some(h) => {
                        let k = self.tree.key(h).clone();
                        self.tree.erase(h)?;
                        Ok(Some(k))
                    }
                    None => Ok(None),
                }
            }

            /// Removes and returns the largest key, if any.
            pub fn pop_last(&mut self) -> Result<Option<K>, Error>
            where
                K: Ord + Clone,
            {
                match self.tree.last() {
                    Some(h) => {
                        let k = self.tree.key(h).clone();
                        self.tree.erase(h)?;
                        Ok(Some(k))
                    }
                    None => Ok(None),
                }
            }

            pub fn iter(&self) -> impl DoubleEndedIterator<Item = &K> {
                Iter::new(&self.tree).map(|(k, _)| k)
            }

            pub fn sum_before(&self, key: &K) -> Result<[W; D], Error>
            where
                K: Ord,
            {
                self.tree.sum_before(key)
            }

            pub fn total_sum(&self) -> [W; D] {
                self.tree.total_sum()
            }

            pub fn check(&self, tolerance: Option<W>) -> Result<(), Error>
            where
                K: Ord,
            {
                self.tree.check(tolerance)
            }

            /// First key `>= key`.
            pub fn lower_bound(&self, key: &K) -> Option<&K>
            where
                K: Ord,
            {
                self.tree.lower_bound(key).map(|h| self.tree.key(h))
            }

            /// First key `> key`.
            pub fn upper_bound(&self, key: &K) -> Option<&K>
            where
                K: Ord,
            {
                self.tree.upper_bound(key).map(|h| self.tree.key(h))
            }

            /// Every key comparing equal to `key` — one for `OrdSet`,
            /// possibly several for `OrdMultiset`.
            pub fn equal_range(&self, key: &K) -> impl DoubleEndedIterator<Item = &K>
            where
                K: Ord,
            {
                let (front, back) = self.tree.equal_range_bounds(key);
                Iter::bounded(&self.tree, front, back).map(|(k, _)| k)
            }

            /// Bulk-insert `iter`'s keys, threading each insertion as a hint
            /// for the next (spec.md §4.5.1) — efficient when `iter` yields
            /// keys already close to sorted order.
            pub fn extend<I>(&mut self, iter: I) -> Result<(), Error>
            where
                K: Ord,
                I: IntoIterator<Item = K>,
            {
                let mut hint = None;
                for k in iter {
                    let (h, _) = self.tree.insert_hint(hint, k, ())?;
                    hint = Some(h);
                }
                Ok(())
            }

            /// Remove every key in `[from, to)`, returning the count removed.
            pub fn erase_range(&mut self, from: &K, to: &K) -> Result<usize, Error>
            where
                K: Ord,
            {
                let before = self.tree.len();
                let first = self.tree.lower_bound(from);
                let last = self.tree.lower_bound(to);
                self.tree.erase_range(first, last)?;
                Ok(before - self.tree.len())
            }

            /// Keeps only the entries for which `pred` returns `true`.
            /// Rebuilds the tree from scratch (O(n log n)); there is no
            /// surgical in-place retain for an augmented tree since every
            /// removal must re-propagate sums anyway.
            pub fn retain<Pred>(&mut self, mut pred: Pred) -> Result<(), Error>
            where
                K: Ord + Clone,
                Pred: FnMut(&K) -> bool,
            {
                let keep: alloc::vec::Vec<K> = Iter::new(&self.tree)
                    .filter(|(k, _)| pred(k))
                    .map(|(k, _)| k.clone())
                    .collect();
                self.tree.clear();
                for k in keep {
                    self.tree.insert(k, ())?;
                }
                Ok(())
            }
        }

        impl<K, W, const D: usize, A, F> IntoIterator for $name<K, W, D, A, F>
        where
            A: Allocator<K, (), W, D>,
            W: Weight,
            F: Fn(&K) -> [W; D],
        {
            type Item = K;
            type IntoIter = core::iter::Map<
                IntoIter<K, (), W, D, A, SetWeight<F>, $policy>,
                fn((K, ())) -> K,
            >;

            fn into_iter(self) -> Self::IntoIter {
                IntoIter::new(self.tree).map(|(k, _)| k)
            }
        }
    };
}

define_set_facade!(
    OrdSet,
    Unique,
    "An ordered set: duplicate keys are rejected (spec.md §4.6)."
);
define_set_facade!(
    OrdMultiset,
    Multi,
    "An ordered multiset: duplicate keys are kept in insertion order (spec.md §4.6)."
);

impl<K, W, const D: usize, F> OrdSet<K, W, D, PtrAlloc<K, (), W, D>, F>
where
    W: Weight,
    F: Fn(&K) -> [W; D],
{
    /// Backed by one heap allocation per node (spec.md §4.3).
    pub fn new(weight_fn: F) -> Self {
        Self::with_allocator(PtrAlloc::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdSet<K, W, D, CompactAllocRealloc<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
    K: Relocatable,
{
    /// Backed by an index-addressed arena over a reallocating vector —
    /// requires `K` to be bitwise-relocatable (spec.md §4.4).
    pub fn new_compact(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocRealloc::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdSet<K, W, D, CompactAllocStacked<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
{
    /// Backed by an index-addressed arena over a stacked-chunk vector — no
    /// relocatability requirement on `K` (spec.md §4.4).
    pub fn new_compact_stacked(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocStacked::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdSet<K, W, D, CompactAllocRealloc<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
    K: Relocatable,
{
    /// Compacts the backing arena, reclaiming every freed slot. The only
    /// operation on the compact back-end that invalidates handles obtained
    /// before it runs (spec.md §4.4).
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    /// Number of slots in the arena, live and deleted alike.
    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, W, const D: usize, F> OrdSet<K, W, D, CompactAllocStacked<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
{
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, W, const D: usize, F> OrdMultiset<K, W, D, PtrAlloc<K, (), W, D>, F>
where
    W: Weight,
    F: Fn(&K) -> [W; D],
{
    pub fn new(weight_fn: F) -> Self {
        Self::with_allocator(PtrAlloc::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdMultiset<K, W, D, CompactAllocRealloc<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
    K: Relocatable,
{
    pub fn new_compact(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocRealloc::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdMultiset<K, W, D, CompactAllocStacked<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
{
    pub fn new_compact_stacked(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocStacked::new(), weight_fn)
    }
}

impl<K, W, const D: usize, F> OrdMultiset<K, W, D, CompactAllocRealloc<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
    K: Relocatable,
{
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, W, const D: usize, F> OrdMultiset<K, W, D, CompactAllocStacked<K, (), W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K) -> [W; D],
{
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_1_simple_weight_one() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(|_k: &i32| [1i64]);
        for k in [1, 2, 1000, 1234] {
            s.insert(k).unwrap();
        }
        assert_eq!(s.sum_before(&1000).unwrap(), [2]);
        assert_eq!(s.total_sum(), [4]);
        let keys: alloc::vec::Vec<i32> = s.iter().copied().collect();
        assert_eq!(keys, alloc::vec![1, 2, 1000, 1234]);
    }

    #[test]
    fn scenario_2_multiset_duplicates() {
        let mut s: OrdMultiset<i32, i64, 1, _, _> = OrdMultiset::new(|_k: &i32| [1i64]);
        for k in [5, 5, 5, 3, 7] {
            s.insert(k).unwrap();
        }
        assert_eq!(s.count(&5), 3);
        let h = s.tree.lower_bound(&5).unwrap();
        s.tree.erase(h).unwrap();
        assert_eq!(s.count(&5), 2);
        let keys: alloc::vec::Vec<i32> = s.iter().copied().collect();
        assert_eq!(keys, alloc::vec![3, 5, 5, 7]);
    }

    #[test]
    fn scenario_6_compaction_preserves_order_and_size() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new_compact(|_k: &i32| [1i64]);
        for k in 0..10 {
            s.insert(k).unwrap();
        }
        for k in (0..10).step_by(2) {
            s.remove(&k).unwrap();
        }
        assert_eq!(s.len(), 5);
        let before: alloc::vec::Vec<i32> = s.iter().copied().collect();
        let sum_before_each: alloc::vec::Vec<[i64; 1]> =
            before.iter().map(|k| s.sum_before(k).unwrap()).collect();

        s.shrink_to_fit();

        assert_eq!(s.len(), 5);
        assert_eq!(s.arena_len(), 5);
        let after: alloc::vec::Vec<i32> = s.iter().copied().collect();
        assert_eq!(before, after);
        for (k, expected) in before.iter().zip(sum_before_each.iter()) {
            assert_eq!(s.sum_before(k).unwrap(), *expected);
        }
    }

    #[test]
    fn multiset_compact_stacked_constructor() {
        let mut s: OrdMultiset<i32, i64, 1, _, _> =
            OrdMultiset::new_compact_stacked(|_k: &i32| [1i64]);
        for k in [5, 5, 3] {
            s.insert(k).unwrap();
        }
        s.check(Some(0)).unwrap();
        s.shrink_to_fit();
        assert_eq!(s.arena_len(), 3);
    }

    #[test]
    fn bounds_and_equal_range() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(|_k: &i32| [1i64]);
        for k in [10, 20, 30, 40] {
            s.insert(k).unwrap();
        }
        assert_eq!(s.lower_bound(&25), Some(&30));
        assert_eq!(s.upper_bound(&30), Some(&40));
        assert_eq!(s.equal_range(&30).copied().collect::<alloc::vec::Vec<_>>(), alloc::vec![30]);
        assert!(s.equal_range(&25).next().is_none());
    }

    #[test]
    fn extend_and_erase_range() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(|_k: &i32| [1i64]);
        s.extend([3, 1, 4, 1, 5]).unwrap();
        s.check(Some(0)).unwrap();
        assert_eq!(s.len(), 4);

        let removed = s.erase_range(&2, &5).unwrap();
        assert_eq!(removed, 2);
        let keys: alloc::vec::Vec<i32> = s.iter().copied().collect();
        assert_eq!(keys, alloc::vec![1, 5]);
    }

    #[test]
    fn into_iter_drains_in_sorted_order() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(|_k: &i32| [1i64]);
        for k in [3, 1, 4, 1, 5, 9, 2, 6] {
            s.insert(k).unwrap();
        }
        let collected: alloc::vec::Vec<i32> = s.into_iter().collect();
        let mut expected = collected.clone();
        expected.sort_unstable();
        assert_eq!(collected, expected);
    }

    #[test]
    fn check_passes_after_mixed_ops() {
        let mut s: OrdSet<i32, i64, 1, _, _> = OrdSet::new(|_k: &i32| [1i64]);
        for k in 0..50 {
            s.insert(k).unwrap();
        }
        for k in (0..50).step_by(2) {
            s.remove(&k).unwrap();
        }
        s.check(Some(0)).unwrap();
        assert_eq!(s.len(), 25);
    }
}
