use core::ops::Index;

use crate::backend::{Allocator, CompactAllocRealloc, CompactAllocStacked, PtrAlloc};
use crate::error::Error;
use crate::reloc::Relocatable;
use crate::tree::{IntoIter, Iter, Multi, Tree, Unique};
use crate::weight::Weight;

macro_rules! define_map_facade {
    ($name:ident, $policy:ty, $doc:expr) => {
        #[doc = $doc]
        pub struct $name<K, V, W, const D: usize, A, F>
        where
            A: Allocator<K, V, W, D>,
            W: Weight,
            F: Fn(&K, &V) -> [W; D],
        {
            tree: Tree<K, V, W, D, A, F, $policy>,
        }

        impl<K, V, W, const D: usize, A, F> $name<K, V, W, D, A, F>
        where
            A: Allocator<K, V, W, D>,
            W: Weight,
            F: Fn(&K, &V) -> [W; D],
        {
            pub fn with_allocator(alloc: A, weight_fn: F) -> Self {
                $name {
                    tree: Tree::new(alloc, weight_fn),
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

            pub fn contains_key(&self, key: &K) -> bool
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

            pub fn get(&self, key: &K) -> Option<&V>
            where
                K: Ord,
            {
                self.tree.find(key).map(|h| self.tree.val(h))
            }

            /// `at(k)`: `KeyAbsent` if `k` is not present (spec.md §4.6).
            pub fn at(&self, key: &K) -> Result<&V, Error>
            where
                K: Ord,
            {
                self.get(key).ok_or(Error::KeyAbsent)
            }

            pub fn insert(&mut self, key: K, val: V) -> Result<Option<V>, Error>
            where
                K: Ord,
            {
                match self.tree.find(&key) {
                    Some(h) => Ok(Some(self.tree.update_value(h, val)?)),
                    None => {
                        self.tree.insert(key, val)?;
                        Ok(None)
                    }
                }
            }

            /// Alias of [`insert`][Self::insert] (see `DESIGN.md` on why
            /// this crate does not also add a panicking throwing form).
            pub fn try_insert(&mut self, key: K, val: V) -> Result<Option<V>, Error>
            where
                K: Ord,
            {
                self.insert(key, val)
            }

            /// Alias of [`try_insert`][Self::try_insert]: in this port
            /// `emplace` never differs from `insert` (see `DESIGN.md`, Open
            /// Question 1).
            pub fn try_emplace(&mut self, key: K, val: V) -> Result<Option<V>, Error>
            where
                K: Ord,
            {
                self.insert(key, val)
            }

            /// Move every entry out of `other` and into `self`, overwriting
            /// on key collision.
            pub fn append(&mut self, other: &mut Self) -> Result<(), Error>
            where
                K: Ord + Clone,
                V: Clone,
            {
                while let Some((k, v)) = other.pop_first()? {
                    self.insert(k, v)?;
                }
                Ok(())
            }

            /// Update `key`'s value in place via `f`, inserting a
            /// default-constructed entry first if absent (spec.md §4.6's
            /// "default-inserting indexed get", generalized to an explicit
            /// default rather than relying on `V: Default` implicitly at
            /// every call site). `f` runs under the same sum-repropagation
            /// guarantee as `update_value` — there is no raw `&mut V` form,
            /// since one would let a caller mutate a value without the tree
            /// ever finding out.
            pub fn entry_or_insert_with(
                &mut self,
                key: K,
                default: V,
                f: impl FnOnce(&mut V),
            ) -> Result<(), Error>
            where
                K: Ord,
            {
                let h = match self.tree.find(&key) {
                    Some(h) => h,
                    None => self.tree.insert(key, default)?.0,
                };
                self.tree.modify_value(h, f)
            }

            pub fn update_value(&mut self, key: &K, val: V) -> Result<V, Error>
            where
                K: Ord,
            {
                let h = self.tree.find(key).ok_or(Error::KeyAbsent)?;
                self.tree.update_value(h, val)
            }

            pub fn set_value(&mut self, key: K, val: V) -> Result<bool, Error>
            where
                K: Ord,
            {
                self.tree.set_value(key, val)
            }

            pub fn remove(&mut self, key: &K) -> Result<usize, Error>
            where
                K: Ord,
            {
                self.tree.erase_key(key)
            }

            pub fn first_key_value(&self) -> Option<(&K, &V)>
            where
                K: Ord,
            {
                self.tree.first().map(|h| (self.tree.key(h), self.tree.val(h)))
            }

            pub fn last_key_value(&self) -> Option<(&K, &V)>
            where
                K: Ord,
            {
                self.tree.last().map(|h| (self.tree.key(h), self.tree.val(h)))
            }

            pub fn pop_first(&mut self) -> Result<Option<(K, V)>, Error>
            where
                K: Ord + Clone,
                V: Clone,
            {
                match self.tree.first() {
                    Some(h) => {
                        let k = self.tree.key(h).clone();
                        let v = self.tree.val(h).clone();
                        self.tree.erase(h)?;
                        Ok(Some((k, v)))
                    }
                    None => Ok(None),
                }
            }

            pub fn pop_last(&mut self) -> Result<Option<(K, V)>, Error>
            where
                K: Ord + Clone,
                V: Clone,
            {
                match self.tree.last() {
                    Some(h) => {
                        let k = self.tree.key(h).clone();
                        let v = self.tree.val(h).clone();
                        self.tree.erase(h)?;
                        Ok(Some((k, v)))
                    }
                    None => Ok(None),
                }
            }

            pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
                Iter::new(&self.tree)
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

            /// First entry with key `>= key`.
            pub fn lower_bound(&self, key: &K) -> Option<(&K, &V)>
            where
                K: Ord,
            {
                self.tree.lower_bound(key).map(|h| (self.tree.key(h), self.tree.val(h)))
            }

            /// First entry with key `> key`.
            pub fn upper_bound(&self, key: &K) -> Option<(&K, &V)>
            where
                K: Ord,
            {
                self.tree.upper_bound(key).map(|h| (self.tree.key(h), self.tree.val(h)))
            }

            /// Every entry whose key compares equal to `key` — one for
            /// `OrdMap`, possibly several in insertion order for
            /// `OrdMultimap`.
            pub fn equal_range(&self, key: &K) -> impl DoubleEndedIterator<Item = (&K, &V)>
            where
                K: Ord,
            {
                let (front, back) = self.tree.equal_range_bounds(key);
                Iter::bounded(&self.tree, front, back)
            }

            /// Bulk-insert `iter`'s entries, threading each insertion as a
            /// hint for the next (spec.md §4.5.1) — efficient when `iter`
            /// yields entries already close to sorted order.
            pub fn extend<I>(&mut self, iter: I) -> Result<(), Error>
            where
                K: Ord,
                I: IntoIterator<Item = (K, V)>,
            {
                let mut hint = None;
                for (k, v) in iter {
                    let (h, _) = self.tree.insert_hint(hint, k, v)?;
                    hint = Some(h);
                }
                Ok(())
            }

            /// Remove every entry with key in `[from, to)`, returning the
            /// count removed.
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

            /// See `OrdSet::retain` — same rebuild-from-scratch strategy.
            pub fn retain<Pred>(&mut self, mut pred: Pred) -> Result<(), Error>
            where
                K: Ord + Clone,
                V: Clone,
                Pred: FnMut(&K, &V) -> bool,
            {
                let keep: alloc::vec::Vec<(K, V)> = Iter::new(&self.tree)
                    .filter(|(k, v)| pred(k, v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                self.tree.clear();
                for (k, v) in keep {
                    self.tree.insert(k, v)?;
                }
                Ok(())
            }
        }

        impl<K, V, W, const D: usize, A, F> Index<&K> for $name<K, V, W, D, A, F>
        where
            A: Allocator<K, V, W, D>,
            W: Weight,
            F: Fn(&K, &V) -> [W; D],
            K: Ord,
        {
            type Output = V;

            fn index(&self, key: &K) -> &V {
                self.get(key).expect("no entry found for key")
            }
        }

        impl<K, V, W, const D: usize, A, F> IntoIterator for $name<K, V, W, D, A, F>
        where
            A: Allocator<K, V, W, D>,
            W: Weight,
            F: Fn(&K, &V) -> [W; D],
        {
            type Item = (K, V);
            type IntoIter = IntoIter<K, V, W, D, A, F, $policy>;

            fn into_iter(self) -> Self::IntoIter {
                IntoIter::new(self.tree)
            }
        }
    };
}

define_map_facade!(
    OrdMap,
    Unique,
    "An ordered map: duplicate keys are rejected (spec.md §4.6)."
);
define_map_facade!(
    OrdMultimap,
    Multi,
    "An ordered multimap: duplicate keys are kept in insertion order (spec.md §4.6)."
);

impl<K, V, W, const D: usize, F> OrdMap<K, V, W, D, PtrAlloc<K, V, W, D>, F>
where
    W: Weight,
    F: Fn(&K, &V) -> [W; D],
{
    pub fn new(weight_fn: F) -> Self {
        Self::with_allocator(PtrAlloc::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMap<K, V, W, D, CompactAllocRealloc<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
    K: Relocatable,
    V: Relocatable,
{
    pub fn new_compact(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocRealloc::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMap<K, V, W, D, CompactAllocStacked<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
{
    pub fn new_compact_stacked(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocStacked::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMap<K, V, W, D, CompactAllocRealloc<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
    K: Relocatable,
    V: Relocatable,
{
    /// See `OrdSet::shrink_to_fit`.
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, V, W, const D: usize, F> OrdMap<K, V, W, D, CompactAllocStacked<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
{
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, V, W, const D: usize, F> OrdMultimap<K, V, W, D, PtrAlloc<K, V, W, D>, F>
where
    W: Weight,
    F: Fn(&K, &V) -> [W; D],
{
    pub fn new(weight_fn: F) -> Self {
        Self::with_allocator(PtrAlloc::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMultimap<K, V, W, D, CompactAllocRealloc<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
    K: Relocatable,
    V: Relocatable,
{
    pub fn new_compact(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocRealloc::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMultimap<K, V, W, D, CompactAllocStacked<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
{
    pub fn new_compact_stacked(weight_fn: F) -> Self {
        Self::with_allocator(CompactAllocStacked::new(), weight_fn)
    }
}

impl<K, V, W, const D: usize, F> OrdMultimap<K, V, W, D, CompactAllocRealloc<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
    K: Relocatable,
    V: Relocatable,
{
    pub fn shrink_to_fit(&mut self) {
        self.tree.alloc_mut().shrink_to_fit();
    }

    pub fn arena_len(&mut self) -> usize {
        self.tree.alloc_mut().arena_len()
    }
}

impl<K, V, W, const D: usize, F> OrdMultimap<K, V, W, D, CompactAllocStacked<K, V, W, D>, F>
where
    W: Weight + Relocatable,
    F: Fn(&K, &V) -> [W; D],
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
    fn scenario_3_map_weight_depends_on_value() {
        let mut m: OrdMap<u32, u32, i64, 1, _, _> =
            OrdMap::new(|k: &u32, v: &u32| [2 * (*k as i64 + *v as i64)]);
        m.insert(1, 2).unwrap();
        m.insert(1000, 1234).unwrap();
        assert_eq!(m.sum_before(&1000).unwrap(), [6]);
        assert_eq!(m.total_sum(), [6 + 2 * 2234]);
    }

    #[test]
    fn scenario_4_vector_weight() {
        let params = [1.0f64, 2.5, 5.555555];
        let weight_fn = move |k: &u32, v: &u32| {
            let mut out = [0.0f64; 3];
            for i in 0..3 {
                out[i] = params[i] * (*k as f64) * (*v as f64);
            }
            out
        };
        let mut m: OrdMap<u32, u32, f64, 3, _, _> = OrdMap::new(weight_fn);
        m.insert(1, 3).unwrap();
        m.insert(10, 1).unwrap();
        m.insert(5, 2).unwrap();
        let got = m.sum_before(&10).unwrap();
        let expected = [13.0, 32.5, 72.222215];
        for i in 0..3 {
            assert!((got[i] - expected[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn scenario_5_integer_overflow_is_fatal() {
        let mut m: OrdMap<u32, u32, u32, 1, _, _> = OrdMap::new(|k: &u32, _v: &u32| [*k]);
        m.insert(1u32 << 31, 0).unwrap();
        let err = m.insert((1u32 << 31) + 1, 0).unwrap_err();
        assert_eq!(err, Error::Arithmetic);
    }

    #[test]
    fn update_coherence() {
        let mut m: OrdMap<i32, i32, i64, 1, _, _> = OrdMap::new(|_k: &i32, v: &i32| [*v as i64]);
        m.insert(1, 10).unwrap();
        m.insert(2, 20).unwrap();
        m.insert(3, 30).unwrap();
        let before = m.sum_before(&3).unwrap();
        m.update_value(&2, 99).unwrap();
        let after = m.sum_before(&3).unwrap();
        assert_eq!(after[0] - before[0], 99 - 20);
    }
}
