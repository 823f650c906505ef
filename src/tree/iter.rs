use super::core::{KeyPolicy, Tree};
use crate::backend::Allocator;
use crate::weight::{Weight, WeightFn};

/// Forward in-order iterator over a tree's entries. A thin `(tree, handle)`
/// pair per spec.md §9's "iterator-via-index" note — it carries no state of
/// its own beyond the cursor, so it works identically over `PtrAlloc` and
/// `CompactAlloc`.
pub(crate) struct Iter<'a, K, V, W, const D: usize, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    tree: &'a Tree<K, V, W, D, A, WF, P>,
    front: Option<A::Handle>,
    back: Option<A::Handle>,
    done: bool,
}

impl<'a, K, V, W, const D: usize, A, WF, P> Iter<'a, K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    pub fn new(tree: &'a Tree<K, V, W, D, A, WF, P>) -> Self {
        Iter {
            tree,
            front: tree.first(),
            back: tree.last(),
            done: tree.is_empty(),
        }
    }

    /// Iterate only `[front, back]`, inclusive on both ends, as produced by
    /// `Tree::equal_range_bounds`. Either end `None` means an empty range.
    pub fn bounded(
        tree: &'a Tree<K, V, W, D, A, WF, P>,
        front: Option<A::Handle>,
        back: Option<A::Handle>,
    ) -> Self {
        Iter {
            tree,
            front,
            back,
            done: front.is_none() || back.is_none(),
        }
    }
}

impl<'a, K, V, W, const D: usize, A, WF, P> Iterator for Iter<'a, K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let h = self.front?;
        if Some(h) == self.back {
            self.done = true;
        } else {
            self.front = self.tree.next(Some(h));
        }
        Some((self.tree.key(h), self.tree.val(h)))
    }
}

impl<'a, K, V, W, const D: usize, A, WF, P> DoubleEndedIterator for Iter<'a, K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let h = self.back?;
        if Some(h) == self.front {
            self.done = true;
        } else {
            self.back = self.tree.prev(Some(h));
        }
        Some((self.tree.key(h), self.tree.val(h)))
    }
}

/// Owning, sorted-order-draining iterator: each call takes the current
/// minimum out of the tree via `Tree::erase_take`, so no entry is ever
/// cloned.
pub struct IntoIter<K, V, W, const D: usize, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    tree: Tree<K, V, W, D, A, WF, P>,
}

impl<K, V, W, const D: usize, A, WF, P> IntoIter<K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    pub fn new(tree: Tree<K, V, W, D, A, WF, P>) -> Self {
        IntoIter { tree }
    }
}

impl<K, V, W, const D: usize, A, WF, P> Iterator for IntoIter<K, V, W, D, A, WF, P>
where
    A: Allocator<K, V, W, D>,
    W: Weight,
    WF: WeightFn<K, V, W, D>,
    P: KeyPolicy,
{
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let h = self.tree.first()?;
        Some(
            self.tree
                .erase_take(h)
                .expect("draining erase of a live handle cannot fail"),
        )
    }
}
