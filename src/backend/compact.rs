use core::marker::PhantomData;

use super::{Allocator, Color};
use crate::error::Error;
use crate::reloc::Relocatable;
use crate::vec::{ReallocVec, StackedVec};
use crate::weight::Weight;

/// High bit of the packed parent field holds color; the low 31 bits hold an
/// index (or one of the two reserved patterns below). Per spec.md §4.4,
/// "with a 32-bit index this permits 2³¹ − 2 entries" — one pattern is
/// reserved for "no parent" (root) and one for "this slot is deleted".
const COLOR_BIT: u32 = 1 << 31;
const INDEX_MASK: u32 = !COLOR_BIT;
const NONE_INDEX: u32 = INDEX_MASK;
const DELETED_MARK: u32 = INDEX_MASK - 1;

#[inline]
fn pack_parent(idx: Option<u32>, color: Color) -> u32 {
    let base = idx.unwrap_or(NONE_INDEX);
    debug_assert!(base <= INDEX_MASK);
    let color_bit = if color == Color::Red { COLOR_BIT } else { 0 };
    base | color_bit
}

#[inline]
fn unpack_index(field: u32) -> Option<u32> {
    let idx = field & INDEX_MASK;
    if idx == NONE_INDEX {
        None
    } else {
        Some(idx)
    }
}

#[inline]
fn unpack_color(field: u32) -> Color {
    if field & COLOR_BIT != 0 {
        Color::Red
    } else {
        Color::Black
    }
}

/// One slot of the arena: either a live node's topology, or — once freed — a
/// doubly-linked free-list element (the same `left`/`right` fields are
/// reinterpreted as "previous free"/"next free").
pub struct Slot<K, V, W, const D: usize> {
    entry: Option<(K, V)>,
    parent_packed: u32,
    left: u32,
    right: u32,
    _w: PhantomData<[W; D]>,
}

unsafe impl<K: Relocatable, V: Relocatable, W, const D: usize> Relocatable for Slot<K, V, W, D> {}

impl<K, V, W, const D: usize> Slot<K, V, W, D> {
    fn is_deleted(&self) -> bool {
        self.entry.is_none()
    }
}

/// Backing storage for the arena: `Realloc` requires the node slot to be
/// bitwise-relocatable, `Stacked` accepts any element type. The choice is the
/// type parameter `S` itself, fixed at container-construction time — never a
/// runtime branch (spec.md §4.4/Design Notes).
pub trait NodeStore<T> {
    fn new() -> Self;
    fn len(&self) -> usize;
    fn get(&self, idx: usize) -> &T;
    fn get_mut(&mut self, idx: usize) -> &mut T;
    fn push(&mut self, value: T) -> Result<(), Error>;
    fn truncate_last(&mut self) -> T;
    fn clear(&mut self);
}

impl<T: Relocatable> NodeStore<T> for ReallocVec<T> {
    fn new() -> Self {
        ReallocVec::new()
    }
    fn len(&self) -> usize {
        ReallocVec::len(self)
    }
    fn get(&self, idx: usize) -> &T {
        ReallocVec::get(self, idx).expect("compact alloc index out of bounds")
    }
    fn get_mut(&mut self, idx: usize) -> &mut T {
        ReallocVec::get_mut(self, idx).expect("compact alloc index out of bounds")
    }
    fn push(&mut self, value: T) -> Result<(), Error> {
        ReallocVec::try_push(self, value).map_err(|(_, e)| e)
    }
    fn truncate_last(&mut self) -> T {
        ReallocVec::pop(self).expect("truncate_last on empty store")
    }
    fn clear(&mut self) {
        ReallocVec::clear(self)
    }
}

impl<T> NodeStore<T> for StackedVec<T> {
    fn new() -> Self {
        StackedVec::new()
    }
    fn len(&self) -> usize {
        StackedVec::len(self)
    }
    fn get(&self, idx: usize) -> &T {
        StackedVec::get(self, idx).expect("compact alloc index out of bounds")
    }
    fn get_mut(&mut self, idx: usize) -> &mut T {
        StackedVec::get_mut(self, idx).expect("compact alloc index out of bounds")
    }
    fn push(&mut self, value: T) -> Result<(), Error> {
        StackedVec::push(self, value);
        Ok(())
    }
    fn truncate_last(&mut self) -> T {
        StackedVec::pop(self).expect("truncate_last on empty store")
    }
    fn clear(&mut self) {
        StackedVec::clear(self)
    }
}

/// Arena allocator: nodes packed into a `NodeStore` (`ReallocVec` or
/// `StackedVec`), subtree sums packed into a parallel `ReallocVec` (sums are
/// always bitwise-relocatable scalars, so they reuse `ReallocVec` regardless
/// of which store backs the nodes themselves — spec.md §4.4). Handles are
/// `u32` indices; freed slots form an intrusive free-list through their
/// `left`/`right` fields, reused by `new_node` before the arena grows. Which
/// `NodeStore` backs a given container is fixed at construction time via the
/// `CompactAllocRealloc`/`CompactAllocStacked` aliases, never a runtime
/// branch.
pub struct CompactAlloc<K, V, W: Weight + Relocatable, const D: usize, S: NodeStore<Slot<K, V, W, D>>> {
    nodes: S,
    sums: ReallocVec<[W; D]>,
    free_head: u32,
    root_idx: u32,
    len: usize,
    _kv: PhantomData<(K, V)>,
}

/// `CompactAlloc` over `ReallocVec` storage — pick this when the node's
/// entry type is bitwise-relocatable.
pub type CompactAllocRealloc<K, V, W, const D: usize> =
    CompactAlloc<K, V, W, D, ReallocVec<Slot<K, V, W, D>>>;

/// `CompactAlloc` over `StackedVec` storage — always applicable, required
/// when the entry type cannot be bitwise-relocated.
pub type CompactAllocStacked<K, V, W, const D: usize> =
    CompactAlloc<K, V, W, D, StackedVec<Slot<K, V, W, D>>>;

impl<K, V, W, const D: usize, S> CompactAlloc<K, V, W, D, S>
where
    W: Weight + Relocatable,
    S: NodeStore<Slot<K, V, W, D>>,
{
    pub fn new() -> Self {
        CompactAlloc {
            nodes: S::new(),
            sums: ReallocVec::new(),
            free_head: NONE_INDEX,
            root_idx: NONE_INDEX,
            len: 0,
            _kv: PhantomData,
        }
    }

    /// Number of slots in the arena, live and deleted alike (`size(nodes)` in
    /// spec.md §8's invariant 7 / scenario 6).
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    fn slot(&self, idx: u32) -> &Slot<K, V, W, D> {
        self.nodes.get(idx as usize)
    }

    fn slot_mut(&mut self, idx: u32) -> &mut Slot<K, V, W, D> {
        self.nodes.get_mut(idx as usize)
    }

    fn unlink_free(&mut self, idx: u32) {
        let (prev, next) = {
            let s = self.slot(idx);
            (unpack_index(s.left), unpack_index(s.right))
        };
        match prev {
            Some(p) => self.slot_mut(p).right = next.unwrap_or(NONE_INDEX),
            None => self.free_head = next.unwrap_or(NONE_INDEX),
        }
        if let Some(n) = next {
            self.slot_mut(n).left = prev.unwrap_or(NONE_INDEX);
        }
    }

    fn push_free(&mut self, idx: u32) {
        let old_head = self.free_head;
        {
            let s = self.slot_mut(idx);
            s.entry = None;
            s.parent_packed = DELETED_MARK;
            s.left = NONE_INDEX;
            s.right = old_head;
        }
        if old_head != NONE_INDEX {
            self.slot_mut(old_head).left = idx;
        }
        self.free_head = idx;
    }

    /// The sole compaction / handle-invalidation operation (spec.md §4.4).
    /// Moves live tail nodes into deleted front slots until the free list is
    /// exhausted, then releases the freed backing memory.
    pub fn shrink_to_fit(&mut self) {
        loop {
            let last = match self.nodes.len().checked_sub(1) {
                None => break,
                Some(l) => l as u32,
            };
            if self.slot(last).is_deleted() {
                self.unlink_free(last);
                self.nodes.truncate_last();
                self.sums.pop();
                continue;
            }
            if self.free_head == NONE_INDEX {
                break;
            }
            let target = self.free_head;
            self.unlink_free(target);
            self.move_node(last, target);
            self.nodes.truncate_last();
            self.sums.pop();
        }
        self.sums.shrink_to(self.sums.len());
    }

    /// Relocate the live node at `from` into slot `to` (which must currently
    /// be an unlinked deleted slot), repointing its parent and children.
    fn move_node(&mut self, from: u32, to: u32) {
        let (entry, parent_packed, left, right) = {
            let s = self.slot_mut(from);
            (s.entry.take(), s.parent_packed, s.left, s.right)
        };
        let sum = *self.sums.get(from as usize).expect("sums/nodes length mismatch");

        {
            let dst = self.slot_mut(to);
            dst.entry = entry;
            dst.parent_packed = parent_packed;
            dst.left = left;
            dst.right = right;
        }
        *self.sums.get_mut(to as usize).expect("sums/nodes length mismatch") = sum;

        let parent = unpack_index(parent_packed);
        match parent {
            Some(p) => {
                let p_slot = self.slot_mut(p);
                if unpack_index(p_slot.left) == Some(from) {
                    p_slot.left = to;
                } else {
                    debug_assert_eq!(unpack_index(p_slot.right), Some(from));
                    p_slot.right = to;
                }
            }
            None => self.root_idx = to,
        }

        if let Some(l) = unpack_index(left) {
            let color = unpack_color(self.slot(l).parent_packed);
            self.slot_mut(l).parent_packed = pack_parent(Some(to), color);
        }
        if let Some(r) = unpack_index(right) {
            let color = unpack_color(self.slot(r).parent_packed);
            self.slot_mut(r).parent_packed = pack_parent(Some(to), color);
        }
    }
}

impl<K, V, W, const D: usize, S> Default for CompactAlloc<K, V, W, D, S>
where
    W: Weight + Relocatable,
    S: NodeStore<Slot<K, V, W, D>>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, W, const D: usize, S> Allocator<K, V, W, D> for CompactAlloc<K, V, W, D, S>
where
    W: Weight + Relocatable,
    S: NodeStore<Slot<K, V, W, D>>,
{
    type Handle = u32;

    fn len(&self) -> usize {
        self.len
    }

    fn root(&self) -> Option<Self::Handle> {
        if self.root_idx == NONE_INDEX {
            None
        } else {
            Some(self.root_idx)
        }
    }

    fn set_root(&mut self, h: Option<Self::Handle>) {
        self.root_idx = h.unwrap_or(NONE_INDEX);
    }

    fn new_node(&mut self, key: K, val: V, sum: [W; D]) -> Result<Self::Handle, Error> {
        let idx = if self.free_head != NONE_INDEX {
            let idx = self.free_head;
            self.unlink_free(idx);
            let s = self.slot_mut(idx);
            s.entry = Some((key, val));
            s.parent_packed = pack_parent(None, Color::Red);
            s.left = NONE_INDEX;
            s.right = NONE_INDEX;
            *self.sums.get_mut(idx as usize).expect("sums/nodes length mismatch") = sum;
            idx
        } else {
            let idx = self.nodes.len();
            if idx as u64 >= DELETED_MARK as u64 {
                return Err(Error::Capacity);
            }
            // Grow `sums` first: if `nodes` then fails to grow, popping the
            // reserved sum back off keeps the two arenas the same length.
            self.sums.try_push(sum).map_err(|(_, e)| e)?;
            if let Err(e) = self.nodes.push(Slot {
                entry: Some((key, val)),
                parent_packed: pack_parent(None, Color::Red),
                left: NONE_INDEX,
                right: NONE_INDEX,
                _w: PhantomData,
            }) {
                self.sums.pop();
                return Err(e);
            }
            idx as u32
        };
        self.len += 1;
        Ok(idx)
    }

    fn free_node(&mut self, h: Self::Handle) -> (K, V) {
        let entry = self.slot_mut(h).entry.take().expect("double free");
        self.push_free(h);
        self.len -= 1;
        entry
    }

    fn key(&self, h: Self::Handle) -> &K {
        &self.slot(h).entry.as_ref().expect("stale handle").0
    }

    fn val(&self, h: Self::Handle) -> &V {
        &self.slot(h).entry.as_ref().expect("stale handle").1
    }

    fn val_mut(&mut self, h: Self::Handle) -> &mut V {
        &mut self.slot_mut(h).entry.as_mut().expect("stale handle").1
    }

    fn replace_val(&mut self, h: Self::Handle, val: V) -> V {
        core::mem::replace(
            &mut self.slot_mut(h).entry.as_mut().expect("stale handle").1,
            val,
        )
    }

    fn color(&self, h: Self::Handle) -> Color {
        unpack_color(self.slot(h).parent_packed)
    }

    fn set_color(&mut self, h: Self::Handle, c: Color) {
        let s = self.slot_mut(h);
        let parent = unpack_index(s.parent_packed);
        s.parent_packed = pack_parent(parent, c);
    }

    fn parent(&self, h: Self::Handle) -> Option<Self::Handle> {
        unpack_index(self.slot(h).parent_packed)
    }

    fn set_parent(&mut self, h: Self::Handle, p: Option<Self::Handle>) {
        let s = self.slot_mut(h);
        let color = unpack_color(s.parent_packed);
        s.parent_packed = pack_parent(p, color);
    }

    fn left(&self, h: Self::Handle) -> Option<Self::Handle> {
        unpack_index(self.slot(h).left)
    }

    fn set_left(&mut self, h: Self::Handle, l: Option<Self::Handle>) {
        self.slot_mut(h).left = l.unwrap_or(NONE_INDEX);
    }

    fn right(&self, h: Self::Handle) -> Option<Self::Handle> {
        unpack_index(self.slot(h).right)
    }

    fn set_right(&mut self, h: Self::Handle, r: Option<Self::Handle>) {
        self.slot_mut(h).right = r.unwrap_or(NONE_INDEX);
    }

    fn sum(&self, h: Self::Handle) -> [W; D] {
        *self.sums.get(h as usize).expect("stale handle")
    }

    fn set_sum(&mut self, h: Self::Handle, s: [W; D]) {
        *self.sums.get_mut(h as usize).expect("stale handle") = s;
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.sums.clear();
        self.free_head = NONE_INDEX;
        self.root_idx = NONE_INDEX;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> CompactAllocRealloc<i32, i32, i64, 1> {
        CompactAlloc::new()
    }

    #[test]
    fn new_node_reuses_free_list_before_growing() {
        let mut a = fresh();
        let n1 = a.new_node(1, 1, [0]).unwrap();
        let n2 = a.new_node(2, 2, [0]).unwrap();
        let n3 = a.new_node(3, 3, [0]).unwrap();
        assert_eq!((n1, n2, n3), (0, 1, 2));

        a.free_node(n2);
        let n4 = a.new_node(4, 4, [0]).unwrap();
        assert_eq!(n4, 1, "free slot should be reused before growing");
        assert_eq!(a.arena_len(), 3);
    }

    #[test]
    fn parent_color_pack_roundtrips() {
        let mut a = fresh();
        let h = a.new_node(1, 1, [0]).unwrap();
        a.set_color(h, Color::Black);
        assert_eq!(a.color(h), Color::Black);
        let p = a.new_node(2, 2, [0]).unwrap();
        a.set_parent(h, Some(p));
        assert_eq!(a.parent(h), Some(p));
        assert_eq!(a.color(h), Color::Black, "setting parent must not disturb color");
    }

    #[test]
    fn shrink_to_fit_preserves_live_topology() {
        let mut a = fresh();
        let mut handles = alloc::vec::Vec::new();
        for i in 0..10 {
            handles.push(a.new_node(i, i, [i as i64]).unwrap());
        }
        // Delete every other node.
        for i in (0..10).step_by(2) {
            a.free_node(handles[i]);
        }
        assert_eq!(a.len(), 5);
        a.shrink_to_fit();
        assert_eq!(a.len(), 5);
        assert_eq!(a.arena_len(), 5);
    }
}
