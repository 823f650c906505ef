use core::cmp::Ordering;
use core::marker::PhantomData;

use crate::backend::{Allocator, Color};
use crate::error::Error;
use crate::weight::{add_into, combine3, zero, Weight, WeightFn};

/// Selects whether a `Tree` rejects or accepts duplicate keys. Sealed: the
/// only implementors are [`Unique`] and [`Multi`] below.
pub(crate) trait KeyPolicy {
    const ALLOWS_DUPLICATES: bool;
}

/// Duplicate keys are rejected; `insert` on a colliding key returns the
/// existing handle with `inserted = false`.
pub struct Unique;
impl KeyPolicy for Unique {
    const ALLOWS_DUPLICATES: bool = false;
}

/// Duplicate keys are accepted; a new entry with an equal key is always
/// placed after every existing entry sharing that key.
pub struct Multi;
impl KeyPolicy for Multi {
    const ALLOWS_DUPLICATES: bool = true;
}

/// A red-black tree augmented with a `D`-component subtree sum, generalized
/// over a node storage back-end `A`, a caller-supplied weight function `WF`,
/// and a duplicate-key policy `P`. Ordering is the type's own `Ord`, the
/// idiomatic-Rust substitute for a caller-supplied comparator object.
///
/// `Option<A::Handle>` stands in for "nil" throughout; there is no physical
/// header or sentinel node (see `SPEC_FULL.md` §3 for why).
pub(crate) struct Tree<K, V, W, const D: usize, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
{
    alloc: A,
    weight_fn: WF,
    _policy: PhantomData<P>,
    _kvw: PhantomData<(K, V, W)>,
}

impl<K, V, W, const D: usize, A, WF, P> Tree<K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    pub fn new(alloc: A, weight_fn: WF) -> Self {
        Tree {
            alloc,
            weight_fn,
            _policy: PhantomData,
            _kvw: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.alloc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alloc.len() == 0
    }

    pub fn clear(&mut self) {
        self.alloc.clear();
    }

    pub fn key(&self, h: A::Handle) -> &K {
        self.alloc.key(h)
    }

    pub fn val(&self, h: A::Handle) -> &V {
        self.alloc.val(h)
    }

    pub(crate) fn val_mut(&mut self, h: A::Handle) -> &mut V {
        self.alloc.val_mut(h)
    }

    /// Escape hatch for façades that need a backend-specific operation (e.g.
    /// `CompactAlloc::shrink_to_fit`) not part of the `Allocator` capability
    /// set `Tree`'s own algorithms are written against.
    pub(crate) fn alloc_mut(&mut self) -> &mut A {
        &mut self.alloc
    }

    pub fn total_sum(&self) -> [W; D] {
        self.sum_opt(self.alloc.root())
    }

    // ---- internal helpers -------------------------------------------------

    fn color_opt(&self, h: Option<A::Handle>) -> Color {
        match h {
            Some(h) => self.alloc.color(h),
            None => Color::Black,
        }
    }

    fn sum_opt(&self, h: Option<A::Handle>) -> [W; D] {
        match h {
            Some(h) => self.alloc.sum(h),
            None => zero(),
        }
    }

    fn own_weight(&self, h: A::Handle) -> [W; D] {
        self.weight_fn.weight(self.alloc.key(h), self.alloc.val(h))
    }

    fn recompute_sum(&mut self, h: A::Handle) -> Result<(), Error> {
        let own = self.own_weight(h);
        let l = self.sum_opt(self.alloc.left(h));
        let r = self.sum_opt(self.alloc.right(h));
        let s = combine3(own, l, r)?;
        self.alloc.set_sum(h, s);
        Ok(())
    }

    /// Recompute `start`'s sum and every ancestor's, up to and including the
    /// real root. Correct any time exactly one descendant subtree of `start`
    /// (or `start`'s own weight) changed and nothing else did.
    fn propagate_up(&mut self, start: Option<A::Handle>) -> Result<(), Error> {
        let mut cur = start;
        while let Some(h) = cur {
            self.recompute_sum(h)?;
            cur = self.alloc.parent(h);
        }
        Ok(())
    }

    fn minimum(&self, mut h: A::Handle) -> A::Handle {
        while let Some(l) = self.alloc.left(h) {
            h = l;
        }
        h
    }

    fn maximum(&self, mut h: A::Handle) -> A::Handle {
        while let Some(r) = self.alloc.right(h) {
            h = r;
        }
        h
    }

    /// Left rotation at `x`, per spec.md §4.5.6: rewires pointers, then
    /// re-derives `sum(x)` and `sum(y)` in that order (`y`'s new subtree
    /// contains `x`'s).
    fn rotate_left(&mut self, x: A::Handle) -> Result<(), Error> {
        let y = self
            .alloc
            .right(x)
            .expect("rotate_left requires a right child");
        let y_left = self.alloc.left(y);
        self.alloc.set_right(x, y_left);
        if let Some(yl) = y_left {
            self.alloc.set_parent(yl, Some(x));
        }
        let x_parent = self.alloc.parent(x);
        self.alloc.set_parent(y, x_parent);
        match x_parent {
            None => self.alloc.set_root(Some(y)),
            Some(p) => {
                if self.alloc.left(p) == Some(x) {
                    self.alloc.set_left(p, Some(y));
                } else {
                    self.alloc.set_right(p, Some(y));
                }
            }
        }
        self.alloc.set_left(y, Some(x));
        self.alloc.set_parent(x, Some(y));
        self.recompute_sum(x)?;
        self.recompute_sum(y)?;
        Ok(())
    }

    /// Mirror of `rotate_left`.
    fn rotate_right(&mut self, x: A::Handle) -> Result<(), Error> {
        let y = self
            .alloc
            .left(x)
            .expect("rotate_right requires a left child");
        let y_right = self.alloc.right(y);
        self.alloc.set_left(x, y_right);
        if let Some(yr) = y_right {
            self.alloc.set_parent(yr, Some(x));
        }
        let x_parent = self.alloc.parent(x);
        self.alloc.set_parent(y, x_parent);
        match x_parent {
            None => self.alloc.set_root(Some(y)),
            Some(p) => {
                if self.alloc.left(p) == Some(x) {
                    self.alloc.set_left(p, Some(y));
                } else {
                    self.alloc.set_right(p, Some(y));
                }
            }
        }
        self.alloc.set_right(y, Some(x));
        self.alloc.set_parent(x, Some(y));
        self.recompute_sum(x)?;
        self.recompute_sum(y)?;
        Ok(())
    }

    // ---- iteration ----------------------------------------------------

    pub fn first(&self) -> Option<A::Handle> {
        self.alloc.root().map(|r| self.minimum(r))
    }

    pub fn last(&self) -> Option<A::Handle> {
        self.alloc.root().map(|r| self.maximum(r))
    }

    /// `next(nil) = nil`.
    pub fn next(&self, h: Option<A::Handle>) -> Option<A::Handle> {
        let h = h?;
        if let Some(r) = self.alloc.right(h) {
            return Some(self.minimum(r));
        }
        let mut cur = h;
        while let Some(p) = self.alloc.parent(cur) {
            if self.alloc.left(p) == Some(cur) {
                return Some(p);
            }
            cur = p;
        }
        None
    }

    /// `prev(nil) = last()`, so an end iterator can decrement.
    pub fn prev(&self, h: Option<A::Handle>) -> Option<A::Handle> {
        let h = match h {
            Some(h) => h,
            None => return self.last(),
        };
        if let Some(l) = self.alloc.left(h) {
            return Some(self.maximum(l));
        }
        let mut cur = h;
        while let Some(p) = self.alloc.parent(cur) {
            if self.alloc.right(p) == Some(cur) {
                return Some(p);
            }
            cur = p;
        }
        None
    }

    // ---- lookup ---------------------------------------------------------

    pub fn find(&self, k: &K) -> Option<A::Handle>
    where
        K: Ord,
    {
        let mut cur = self.alloc.root();
        while let Some(h) = cur {
            match k.cmp(self.alloc.key(h)) {
                Ordering::Equal => return Some(h),
                Ordering::Less => cur = self.alloc.left(h),
                Ordering::Greater => cur = self.alloc.right(h),
            }
        }
        None
    }

    pub fn lower_bound(&self, k: &K) -> Option<A::Handle>
    where
        K: Ord,
    {
        let mut cur = self.alloc.root();
        let mut result = None;
        while let Some(h) = cur {
            if self.alloc.key(h) >= k {
                result = Some(h);
                cur = self.alloc.left(h);
            } else {
                cur = self.alloc.right(h);
            }
        }
        result
    }

    pub fn upper_bound(&self, k: &K) -> Option<A::Handle>
    where
        K: Ord,
    {
        let mut cur = self.alloc.root();
        let mut result = None;
        while let Some(h) = cur {
            if self.alloc.key(h) > k {
                result = Some(h);
                cur = self.alloc.left(h);
            } else {
                cur = self.alloc.right(h);
            }
        }
        result
    }

    /// Inclusive handle bounds `[lower_bound(k), upper_bound(k))`, expressed
    /// as `(first, last)` where `last` is the range's final element rather
    /// than its one-past-end handle (so an empty tree or empty range can
    /// still be represented as `None` without a sentinel). Empty range when
    /// `lower_bound(k) == upper_bound(k)`.
    pub fn equal_range_bounds(&self, k: &K) -> (Option<A::Handle>, Option<A::Handle>)
    where
        K: Ord,
    {
        let lo = self.lower_bound(k);
        let hi = self.upper_bound(k);
        if lo == hi {
            return (None, None);
        }
        let back = match hi {
            Some(h) => self.prev(Some(h)),
            None => self.last(),
        };
        (lo, back)
    }

    pub fn count(&self, k: &K) -> usize
    where
        K: Ord,
    {
        if !P::ALLOWS_DUPLICATES {
            return usize::from(self.find(k).is_some());
        }
        let mut n = 0;
        let mut cur = self.lower_bound(k);
        while let Some(h) = cur {
            if self.alloc.key(h) != k {
                break;
            }
            n += 1;
            cur = self.next(Some(h));
        }
        n
    }

    // ---- partial sums -----------------------------------------------------

    /// spec.md §4.5.5: accumulate `sum(left(h))`, then ascend adding the
    /// parent's own weight plus the parent's left subtree every time the
    /// current node is a right child.
    pub fn sum_before_node(&self, h: Option<A::Handle>) -> Result<[W; D], Error> {
        let h = match h {
            Some(h) => h,
            None => return Ok(self.total_sum()),
        };
        let mut acc = self.sum_opt(self.alloc.left(h));
        let mut cur = h;
        while let Some(p) = self.alloc.parent(cur) {
            if self.alloc.right(p) == Some(cur) {
                let own = self.own_weight(p);
                add_into(&mut acc, &own)?;
                let ls = self.sum_opt(self.alloc.left(p));
                add_into(&mut acc, &ls)?;
            }
            cur = p;
        }
        Ok(acc)
    }

    pub fn sum_before(&self, k: &K) -> Result<[W; D], Error>
    where
        K: Ord,
    {
        self.sum_before_node(self.lower_bound(k))
    }

    // ---- mutation ---------------------------------------------------------

    pub fn insert(&mut self, key: K, val: V) -> Result<(A::Handle, bool), Error>
    where
        K: Ord,
    {
        let mut parent: Option<A::Handle> = None;
        let mut cur = self.alloc.root();
        let mut go_left = true;
        while let Some(h) = cur {
            parent = Some(h);
            match key.cmp(self.alloc.key(h)) {
                Ordering::Less => {
                    cur = self.alloc.left(h);
                    go_left = true;
                }
                Ordering::Greater => {
                    cur = self.alloc.right(h);
                    go_left = false;
                }
                Ordering::Equal => {
                    if !P::ALLOWS_DUPLICATES {
                        return Ok((h, false));
                    }
                    cur = self.alloc.right(h);
                    go_left = false;
                }
            }
        }
        self.attach_new(parent, go_left, key, val)
    }

    /// `emplace` in an idiomatic Rust port: since there is no parameter-pack
    /// forwarding to reproduce, the entry is already fully constructed by the
    /// caller and this is simply `insert` (see `DESIGN.md`, Open Question 1).
    pub fn emplace(&mut self, key: K, val: V) -> Result<(A::Handle, bool), Error>
    where
        K: Ord,
    {
        self.insert(key, val)
    }

    fn attach_new(
        &mut self,
        parent: Option<A::Handle>,
        go_left: bool,
        key: K,
        val: V,
    ) -> Result<(A::Handle, bool), Error>
    where
        K: Ord,
    {
        let own = self.weight_fn.weight(&key, &val);
        let handle = self.alloc.new_node(key, val, own)?;
        self.alloc.set_parent(handle, parent);
        match parent {
            None => self.alloc.set_root(Some(handle)),
            Some(p) => {
                if go_left {
                    self.alloc.set_left(p, Some(handle));
                } else {
                    self.alloc.set_right(p, Some(handle));
                }
            }
        }
        self.propagate_up(parent)?;
        self.insert_fixup(handle)?;
        Ok((handle, true))
    }

    fn insert_before(&mut self, h: A::Handle, key: K, val: V) -> Result<A::Handle, Error>
    where
        K: Ord,
    {
        let (parent, go_left) = match self.alloc.left(h) {
            None => (h, true),
            Some(l) => (self.maximum(l), false),
        };
        Ok(self.attach_new(Some(parent), go_left, key, val)?.0)
    }

    /// Attach as the new last element, given the current `last()` handle.
    fn insert_after(&mut self, last: A::Handle, key: K, val: V) -> Result<A::Handle, Error>
    where
        K: Ord,
    {
        debug_assert!(self.alloc.right(last).is_none());
        Ok(self.attach_new(Some(last), false, key, val)?.0)
    }

    /// spec.md §4.5.2 hint semantics: for unique trees the hint is honored
    /// only when `prev(hint) < key < key(hint)`; for multi trees an equal-key
    /// hint inserts immediately before it, otherwise falls back to
    /// `lower_bound`, and a key greater than everything falls back to `last`.
    pub fn insert_hint(
        &mut self,
        hint: Option<A::Handle>,
        key: K,
        val: V,
    ) -> Result<(A::Handle, bool), Error>
    where
        K: Ord,
    {
        if !P::ALLOWS_DUPLICATES {
            if let Some(h) = hint {
                let before_hint = key < *self.alloc.key(h);
                let after_prev = match self.prev(Some(h)) {
                    Some(p) => *self.alloc.key(p) < key,
                    None => true,
                };
                if before_hint && after_prev {
                    let handle = self.insert_before(h, key, val)?;
                    return Ok((handle, true));
                }
            }
            return self.insert(key, val);
        }

        if let Some(h) = hint {
            if *self.alloc.key(h) == key {
                let handle = self.insert_before(h, key, val)?;
                return Ok((handle, true));
            }
        }
        match self.lower_bound(&key) {
            Some(h) => {
                let handle = self.insert_before(h, key, val)?;
                Ok((handle, true))
            }
            None => match self.last() {
                Some(l) => {
                    let handle = self.insert_after(l, key, val)?;
                    Ok((handle, true))
                }
                None => self.insert(key, val),
            },
        }
    }

    fn insert_fixup(&mut self, mut z: A::Handle) -> Result<(), Error> {
        loop {
            let p = match self.alloc.parent(z) {
                Some(p) if self.alloc.color(p) == Color::Red => p,
                _ => break,
            };
            // Root is always black, so a red node's parent always has a parent.
            let gp = self
                .alloc
                .parent(p)
                .expect("a red node's parent cannot be the root");
            if Some(p) == self.alloc.left(gp) {
                let uncle = self.alloc.right(gp);
                if self.color_opt(uncle) == Color::Red {
                    self.alloc.set_color(p, Color::Black);
                    self.alloc.set_color(uncle.expect("red uncle exists"), Color::Black);
                    self.alloc.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    let (mut z2, mut p2) = (z, p);
                    if Some(z2) == self.alloc.right(p2) {
                        z2 = p2;
                        self.rotate_left(z2)?;
                        p2 = self.alloc.parent(z2).expect("rotated node has a parent");
                    }
                    self.alloc.set_color(p2, Color::Black);
                    self.alloc.set_color(gp, Color::Red);
                    self.rotate_right(gp)?;
                    z = z2;
                }
            } else {
                let uncle = self.alloc.left(gp);
                if self.color_opt(uncle) == Color::Red {
                    self.alloc.set_color(p, Color::Black);
                    self.alloc.set_color(uncle.expect("red uncle exists"), Color::Black);
                    self.alloc.set_color(gp, Color::Red);
                    z = gp;
                } else {
                    let (mut z2, mut p2) = (z, p);
                    if Some(z2) == self.alloc.left(p2) {
                        z2 = p2;
                        self.rotate_right(z2)?;
                        p2 = self.alloc.parent(z2).expect("rotated node has a parent");
                    }
                    self.alloc.set_color(p2, Color::Black);
                    self.alloc.set_color(gp, Color::Red);
                    self.rotate_left(gp)?;
                    z = z2;
                }
            }
        }
        let root = self.alloc.root().expect("tree non-empty after insert");
        self.alloc.set_color(root, Color::Black);
        Ok(())
    }

    fn transplant(&mut self, u: A::Handle, v: Option<A::Handle>) {
        let p = self.alloc.parent(u);
        match p {
            None => self.alloc.set_root(v),
            Some(p) => {
                if self.alloc.left(p) == Some(u) {
                    self.alloc.set_left(p, v);
                } else {
                    self.alloc.set_right(p, v);
                }
            }
        }
        if let Some(v) = v {
            self.alloc.set_parent(v, p);
        }
    }

    /// spec.md §4.5.3: when `z` has two children, swap it with its in-order
    /// successor by pointer rewiring (the successor node physically moves
    /// into `z`'s structural position, keeping its own handle valid), rather
    /// than by copying keys — so a handle a caller holds to the successor
    /// stays correct. Returns the in-order successor of `z`, computed before
    /// any structural change (its identity is unaffected by this splice).
    pub fn erase(&mut self, z: A::Handle) -> Result<Option<A::Handle>, Error> {
        let (successor, _, _) = self.erase_inner(z)?;
        Ok(successor)
    }

    /// Like `erase`, but hands back the removed entry instead of dropping it
    /// — the primitive `IntoIter` drains through.
    pub(crate) fn erase_take(&mut self, z: A::Handle) -> Result<(K, V), Error> {
        let (_, k, v) = self.erase_inner(z)?;
        Ok((k, v))
    }

    fn erase_inner(&mut self, z: A::Handle) -> Result<(Option<A::Handle>, K, V), Error> {
        let successor = self.next(Some(z));

        let removed_color;
        let x: Option<A::Handle>;
        let x_parent: Option<A::Handle>;

        if self.alloc.left(z).is_none() {
            x = self.alloc.right(z);
            x_parent = self.alloc.parent(z);
            removed_color = self.alloc.color(z);
            self.transplant(z, x);
        } else if self.alloc.right(z).is_none() {
            x = self.alloc.left(z);
            x_parent = self.alloc.parent(z);
            removed_color = self.alloc.color(z);
            self.transplant(z, x);
        } else {
            let y = self.minimum(self.alloc.right(z).expect("right child exists"));
            removed_color = self.alloc.color(z);
            x = self.alloc.right(y);
            if self.alloc.parent(y) == Some(z) {
                x_parent = Some(y);
                if let Some(xh) = x {
                    self.alloc.set_parent(xh, Some(y));
                }
            } else {
                x_parent = self.alloc.parent(y);
                self.transplant(y, x);
                self.alloc.set_right(y, self.alloc.right(z));
                if let Some(r) = self.alloc.right(y) {
                    self.alloc.set_parent(r, Some(y));
                }
            }
            self.transplant(z, Some(y));
            self.alloc.set_left(y, self.alloc.left(z));
            if let Some(l) = self.alloc.left(y) {
                self.alloc.set_parent(l, Some(y));
            }
            self.alloc.set_color(y, self.alloc.color(z));
        }

        let (k, v) = self.alloc.free_node(z);
        self.propagate_up(x_parent)?;

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent)?;
        }

        Ok((successor, k, v))
    }

    fn delete_fixup(
        &mut self,
        mut x: Option<A::Handle>,
        mut x_parent: Option<A::Handle>,
    ) -> Result<(), Error> {
        while x != self.alloc.root() && self.color_opt(x) == Color::Black {
            let p = match x_parent {
                Some(p) => p,
                None => break,
            };
            if x == self.alloc.left(p) {
                let mut w = self
                    .alloc
                    .right(p)
                    .expect("sibling must exist under the black-height invariant");
                if self.alloc.color(w) == Color::Red {
                    self.alloc.set_color(w, Color::Black);
                    self.alloc.set_color(p, Color::Red);
                    self.rotate_left(p)?;
                    w = self.alloc.right(p).expect("sibling exists after rotation");
                }
                if self.color_opt(self.alloc.left(w)) == Color::Black
                    && self.color_opt(self.alloc.right(w)) == Color::Black
                {
                    self.alloc.set_color(w, Color::Red);
                    x = Some(p);
                    x_parent = self.alloc.parent(p);
                } else {
                    if self.color_opt(self.alloc.right(w)) == Color::Black {
                        if let Some(wl) = self.alloc.left(w) {
                            self.alloc.set_color(wl, Color::Black);
                        }
                        self.alloc.set_color(w, Color::Red);
                        self.rotate_right(w)?;
                        w = self.alloc.right(p).expect("sibling exists after rotation");
                    }
                    self.alloc.set_color(w, self.alloc.color(p));
                    self.alloc.set_color(p, Color::Black);
                    if let Some(wr) = self.alloc.right(w) {
                        self.alloc.set_color(wr, Color::Black);
                    }
                    self.rotate_left(p)?;
                    x = self.alloc.root();
                    x_parent = None;
                }
            } else {
                let mut w = self
                    .alloc
                    .left(p)
                    .expect("sibling must exist under the black-height invariant");
                if self.alloc.color(w) == Color::Red {
                    self.alloc.set_color(w, Color::Black);
                    self.alloc.set_color(p, Color::Red);
                    self.rotate_right(p)?;
                    w = self.alloc.left(p).expect("sibling exists after rotation");
                }
                if self.color_opt(self.alloc.right(w)) == Color::Black
                    && self.color_opt(self.alloc.left(w)) == Color::Black
                {
                    self.alloc.set_color(w, Color::Red);
                    x = Some(p);
                    x_parent = self.alloc.parent(p);
                } else {
                    if self.color_opt(self.alloc.left(w)) == Color::Black {
                        if let Some(wr) = self.alloc.right(w) {
                            self.alloc.set_color(wr, Color::Black);
                        }
                        self.alloc.set_color(w, Color::Red);
                        self.rotate_left(w)?;
                        w = self.alloc.left(p).expect("sibling exists after rotation");
                    }
                    self.alloc.set_color(w, self.alloc.color(p));
                    self.alloc.set_color(p, Color::Black);
                    if let Some(wl) = self.alloc.left(w) {
                        self.alloc.set_color(wl, Color::Black);
                    }
                    self.rotate_right(p)?;
                    x = self.alloc.root();
                    x_parent = None;
                }
            }
        }
        if let Some(xh) = x {
            self.alloc.set_color(xh, Color::Black);
        }
        Ok(())
    }

    pub fn erase_range(
        &mut self,
        mut first: Option<A::Handle>,
        last: Option<A::Handle>,
    ) -> Result<Option<A::Handle>, Error> {
        while let Some(h) = first {
            if Some(h) == last {
                break;
            }
            first = self.erase(h)?;
        }
        Ok(last)
    }

    pub fn erase_key(&mut self, k: &K) -> Result<usize, Error>
    where
        K: Ord,
    {
        let mut removed = 0;
        loop {
            match self.find(k) {
                Some(h) => {
                    self.erase(h)?;
                    removed += 1;
                    if !P::ALLOWS_DUPLICATES {
                        break;
                    }
                }
                None => break,
            }
        }
        Ok(removed)
    }

    /// Overwrite `h`'s value and re-propagate its subtree sum to the root.
    /// Returns the value previously stored there.
    pub fn update_value(&mut self, h: A::Handle, val: V) -> Result<V, Error> {
        let old = self.alloc.replace_val(h, val);
        self.propagate_up(Some(h))?;
        Ok(old)
    }

    /// Apply `f` to `h`'s value in place, then re-propagate its subtree sum —
    /// the same coherence guarantee as `update_value`, for callers that want
    /// to mutate rather than replace wholesale.
    pub fn modify_value<F>(&mut self, h: A::Handle, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut V),
    {
        f(self.alloc.val_mut(h));
        self.propagate_up(Some(h))
    }

    /// Update `k`'s value if present, otherwise insert it. Returns whether a
    /// new entry was inserted.
    pub fn set_value(&mut self, key: K, val: V) -> Result<bool, Error>
    where
        K: Ord,
    {
        match self.find(&key) {
            Some(h) => {
                self.update_value(h, val)?;
                Ok(false)
            }
            None => {
                self.insert(key, val)?;
                Ok(true)
            }
        }
    }

    /// spec.md §8 invariants 1-5 and 7 (invariant 6, the compact allocator's
    /// free-list partition, is checked at the allocator level — see
    /// `backend::compact`'s tests — since it isn't observable through the
    /// `Allocator` capability set `Tree` is written against).
    ///
    /// `tolerance = None` skips invariant 5 (sum correctness) entirely — the
    /// idiomatic-Rust substitute for spec.md's "negative tolerance" flag,
    /// which doesn't type-check for unsigned `W` (see `DESIGN.md`).
    pub fn check(&self, tolerance: Option<W>) -> Result<(), Error>
    where
        K: Ord,
    {
        if let Some(root) = self.alloc.root() {
            if self.alloc.color(root) != Color::Black {
                return Err(Error::InvariantViolated);
            }
        }
        let mut black_height = None;
        let mut count = 0usize;
        self.check_node(self.alloc.root(), None, &mut black_height, 0, tolerance, &mut count)?;
        if count != self.alloc.len() {
            return Err(Error::InvariantViolated);
        }
        Ok(())
    }

    fn check_node(
        &self,
        h: Option<A::Handle>,
        parent: Option<A::Handle>,
        black_height: &mut Option<usize>,
        running_black: usize,
        tolerance: Option<W>,
        count: &mut usize,
    ) -> Result<(), Error>
    where
        K: Ord,
    {
        let h = match h {
            Some(h) => h,
            None => {
                return match *black_height {
                    Some(bh) if bh != running_black => Err(Error::InvariantViolated),
                    Some(_) => Ok(()),
                    None => {
                        *black_height = Some(running_black);
                        Ok(())
                    }
                };
            }
        };
        *count += 1;

        if self.alloc.parent(h) != parent {
            return Err(Error::InvariantViolated);
        }
        if self.alloc.color(h) == Color::Red
            && (self.color_opt(self.alloc.left(h)) == Color::Red
                || self.color_opt(self.alloc.right(h)) == Color::Red)
        {
            return Err(Error::InvariantViolated);
        }
        // spec.md §8 invariant 2: the left child is always strictly less;
        // the right child is strictly greater for a unique tree, merely
        // not-less for a multi tree (where equal keys nest to the right).
        if let Some(l) = self.alloc.left(h) {
            if self.alloc.key(l) >= self.alloc.key(h) {
                return Err(Error::InvariantViolated);
            }
        }
        if let Some(r) = self.alloc.right(h) {
            let ordered = if P::ALLOWS_DUPLICATES {
                self.alloc.key(r) >= self.alloc.key(h)
            } else {
                self.alloc.key(r) > self.alloc.key(h)
            };
            if !ordered {
                return Err(Error::InvariantViolated);
            }
        }

        let next_black = running_black + usize::from(self.alloc.color(h) == Color::Black);
        self.check_node(self.alloc.left(h), Some(h), black_height, next_black, tolerance, count)?;
        self.check_node(self.alloc.right(h), Some(h), black_height, next_black, tolerance, count)?;

        if let Some(tol) = tolerance {
            let own = self.own_weight(h);
            let l_sum = self.sum_opt(self.alloc.left(h));
            let r_sum = self.sum_opt(self.alloc.right(h));
            let expected = combine3(own, l_sum, r_sum)?;
            let actual = self.alloc.sum(h);
            for i in 0..D {
                if !expected[i].abs_diff(actual[i]).within(tol) {
                    return Err(Error::InvariantViolated);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PtrAlloc;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    type TestTree = Tree<i32, i32, i64, 1, PtrAlloc<i32, i32, i64, 1>, fn(&i32, &i32) -> [i64; 1], Unique>;

    fn rank_weight(_k: &i32, _v: &i32) -> [i64; 1] {
        [1]
    }

    #[test]
    fn insert_find_erase_basic() {
        let mut t: TestTree = Tree::new(PtrAlloc::new(), rank_weight);
        for k in [2, 1, 6, 5, 15, 4, 12, 16, 3, 9, 13, 17, 7, 11, 14, 18, 10] {
            let (_, inserted) = t.insert(k, k).unwrap();
            assert!(inserted);
            t.check(Some(0)).unwrap();
        }
        for k in 1..=18 {
            assert!(t.find(&k).is_some());
        }
        let h = t.find(&5).unwrap();
        t.erase(h).unwrap();
        assert!(t.find(&5).is_none());
        t.check(Some(0)).unwrap();
    }

    #[test]
    fn sum_before_matches_rank() {
        let mut t: TestTree = Tree::new(PtrAlloc::new(), rank_weight);
        for k in [10, 20, 30, 40, 50] {
            t.insert(k, k).unwrap();
        }
        assert_eq!(t.sum_before(&30).unwrap(), [2]);
        assert_eq!(t.sum_before(&5).unwrap(), [0]);
        assert_eq!(t.sum_before(&100).unwrap(), [5]);
        assert_eq!(t.total_sum(), [5]);
    }

    #[test]
    fn random_insert_erase_sequence_preserves_invariants() {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        let mut t: TestTree = Tree::new(PtrAlloc::new(), rank_weight);
        let mut present: alloc::vec::Vec<i32> = alloc::vec::Vec::new();

        for _ in 0..2_000 {
            if present.is_empty() || rng.gen_bool(0.6) {
                let k: i32 = rng.gen_range(0, 500);
                let (_, inserted) = t.insert(k, k).unwrap();
                if inserted {
                    present.push(k);
                }
            } else {
                let idx = rng.gen_range(0, present.len());
                let k = present.swap_remove(idx);
                let h = t.find(&k).expect("key tracked as present");
                t.erase(h).unwrap();
            }
            t.check(Some(0)).unwrap();
        }
        assert_eq!(t.len(), present.len());

        let mut expected = present.clone();
        expected.sort_unstable();
        for (i, k) in expected.iter().enumerate() {
            assert_eq!(t.sum_before(k).unwrap(), [i as i64]);
        }
    }

    #[test]
    fn multi_policy_keeps_duplicates_in_insertion_order() {
        type MultiTree =
            Tree<i32, i32, i64, 1, PtrAlloc<i32, i32, i64, 1>, fn(&i32, &i32) -> [i64; 1], Multi>;
        let mut t: MultiTree = Tree::new(PtrAlloc::new(), rank_weight);
        for v in [100, 200, 300] {
            t.insert(5, v).unwrap();
        }
        assert_eq!(t.count(&5), 3);
        let mut vals = alloc::vec::Vec::new();
        let mut cur = t.lower_bound(&5);
        while let Some(h) = cur {
            if *t.key(h) != 5 {
                break;
            }
            vals.push(*t.val(h));
            cur = t.next(Some(h));
        }
        assert_eq!(vals, alloc::vec![100, 200, 300]);
    }
}
