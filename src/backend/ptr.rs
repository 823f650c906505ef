use core::ptr::NonNull;

use alloc::boxed::Box;

use super::{Allocator, Color};
use crate::error::Error;
use crate::weight::Weight;

pub struct NodeCell<K, V, W, const D: usize> {
    key: K,
    val: V,
    color: Color,
    sum: [W; D],
    parent: Option<NonNull<NodeCell<K, V, W, D>>>,
    left: Option<NonNull<NodeCell<K, V, W, D>>>,
    right: Option<NonNull<NodeCell<K, V, W, D>>>,
}

/// One heap allocation per node; a handle is a stable, non-owning pointer
/// into that allocation (spec.md §4.3). Capacity is unbounded — `new_node`
/// only fails if the host allocator itself is exhausted.
///
/// Child/parent links are non-owning raw pointers rather than a recursive
/// `Box` tree: a node cannot both *own* its parent (as part of being owned
/// by it) and be addressed independently by a stable handle, so ownership of
/// each node's single heap block is tracked only by the fact that exactly one
/// `new_node` call produced it and exactly one `free_node`/`clear` call frees
/// it — the tree topology above is just pointers. This mirrors the corpus's
/// own raw-pointer node allocation pattern (`KentBeck-BPlusTreeMap4`'s
/// `node_alloc.rs`), generalized from a flat byte-blob node to a typed one.
///
/// # Safety
///
/// Every `NonNull<NodeCell<..>>` this type hands out or stores was produced
/// by `Box::into_raw` here and is reclaimed by exactly one matching
/// `Box::from_raw` in `free_node` or `clear`. No handle survives past the
/// call that frees it (this is exactly the spec's handle-invalidation rule:
/// only destruction of the referenced node invalidates its own handle).
pub struct PtrAlloc<K, V, W, const D: usize> {
    root: Option<NonNull<NodeCell<K, V, W, D>>>,
    len: usize,
}

impl<K, V, W, const D: usize> PtrAlloc<K, V, W, D> {
    pub fn new() -> Self {
        PtrAlloc { root: None, len: 0 }
    }
}

impl<K, V, W, const D: usize> Default for PtrAlloc<K, V, W, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, W: Weight, const D: usize> Allocator<K, V, W, D> for PtrAlloc<K, V, W, D> {
    type Handle = NonNull<NodeCell<K, V, W, D>>;

    fn len(&self) -> usize {
        self.len
    }

    fn root(&self) -> Option<Self::Handle> {
        self.root
    }

    fn set_root(&mut self, h: Option<Self::Handle>) {
        self.root = h;
    }

    fn new_node(&mut self, key: K, val: V, sum: [W; D]) -> Result<Self::Handle, Error> {
        let cell = NodeCell {
            key,
            val,
            color: Color::Red,
            sum,
            parent: None,
            left: None,
            right: None,
        };
        let boxed = Box::new(cell);
        let ptr = NonNull::from(Box::leak(boxed));
        self.len += 1;
        Ok(ptr)
    }

    fn free_node(&mut self, h: Self::Handle) -> (K, V) {
        // SAFETY: caller (`Tree`) only ever passes handles that are currently
        // unlinked from the tree topology and have not been freed before.
        let boxed = unsafe { Box::from_raw(h.as_ptr()) };
        self.len -= 1;
        (boxed.key, boxed.val)
    }

    fn key(&self, h: Self::Handle) -> &K {
        unsafe { &h.as_ref().key }
    }

    fn val(&self, h: Self::Handle) -> &V {
        unsafe { &h.as_ref().val }
    }

    fn val_mut(&mut self, h: Self::Handle) -> &mut V {
        unsafe { &mut (*h.as_ptr()).val }
    }

    fn replace_val(&mut self, mut h: Self::Handle, val: V) -> V {
        unsafe { core::mem::replace(&mut h.as_mut().val, val) }
    }

    fn color(&self, h: Self::Handle) -> Color {
        unsafe { h.as_ref().color }
    }

    fn set_color(&mut self, mut h: Self::Handle, c: Color) {
        unsafe { h.as_mut().color = c };
    }

    fn parent(&self, h: Self::Handle) -> Option<Self::Handle> {
        unsafe { h.as_ref().parent }
    }

    fn set_parent(&mut self, mut h: Self::Handle, p: Option<Self::Handle>) {
        unsafe { h.as_mut().parent = p };
    }

    fn left(&self, h: Self::Handle) -> Option<Self::Handle> {
        unsafe { h.as_ref().left }
    }

    fn set_left(&mut self, mut h: Self::Handle, l: Option<Self::Handle>) {
        unsafe { h.as_mut().left = l };
    }

    fn right(&self, h: Self::Handle) -> Option<Self::Handle> {
        unsafe { h.as_ref().right }
    }

    fn set_right(&mut self, mut h: Self::Handle, r: Option<Self::Handle>) {
        unsafe { h.as_mut().right = r };
    }

    fn sum(&self, h: Self::Handle) -> [W; D] {
        unsafe { h.as_ref().sum }
    }

    fn set_sum(&mut self, mut h: Self::Handle, s: [W; D]) {
        unsafe { h.as_mut().sum = s };
    }

    fn clear(&mut self) {
        // Structural post-order free, matching spec.md §4.3's `clear_tree`.
        if let Some(root) = self.root.take() {
            let mut stack = alloc::vec![root];
            let mut to_free = alloc::vec::Vec::new();
            while let Some(h) = stack.pop() {
                let (l, r) = unsafe { (h.as_ref().left, h.as_ref().right) };
                if let Some(l) = l {
                    stack.push(l);
                }
                if let Some(r) = r {
                    stack.push(r);
                }
                to_free.push(h);
            }
            for h in to_free {
                unsafe { drop(Box::from_raw(h.as_ptr())) };
            }
        }
        self.len = 0;
    }
}

impl<K, V, W, const D: usize> Drop for PtrAlloc<K, V, W, D> {
    fn drop(&mut self) {
        if let Some(root) = self.root.take() {
            let mut stack = alloc::vec![root];
            while let Some(h) = stack.pop() {
                let (l, r) = unsafe { (h.as_ref().left, h.as_ref().right) };
                if let Some(l) = l {
                    stack.push(l);
                }
                if let Some(r) = r {
                    stack.push(r);
                }
                unsafe { drop(Box::from_raw(h.as_ptr())) };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_node_and_free_node_roundtrip() {
        let mut a: PtrAlloc<i32, &str, i64, 1> = PtrAlloc::new();
        let h = a.new_node(1, "a", [0]).unwrap();
        assert_eq!(*a.key(h), 1);
        assert_eq!(*a.val(h), "a");
        let (k, v) = a.free_node(h);
        assert_eq!((k, v), (1, "a"));
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn clear_frees_whole_tree() {
        let mut a: PtrAlloc<i32, i32, i64, 1> = PtrAlloc::new();
        let root = a.new_node(2, 2, [0]).unwrap();
        let left = a.new_node(1, 1, [0]).unwrap();
        let right = a.new_node(3, 3, [0]).unwrap();
        a.set_left(root, Some(left));
        a.set_right(root, Some(right));
        a.set_parent(left, Some(root));
        a.set_parent(right, Some(root));
        a.set_root(Some(root));
        assert_eq!(a.len(), 3);
        a.clear();
        assert_eq!(a.len(), 0);
        assert!(a.root().is_none());
    }
}
