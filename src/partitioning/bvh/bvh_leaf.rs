use crate::bounding_volume::{Aabb, BoundingVolume};
use arrayvec::ArrayVec;

/// The maximum number of items a single BVH leaf can hold.
pub const LEAF_MAX_ITEMS: usize = 4;

/// A fixed-capacity leaf of the BVH, holding up to [`LEAF_MAX_ITEMS`] items.
///
/// Item ids and their (margin-expanded) bounds are stored in two parallel arrays so
/// the bounds can be scanned contiguously during queries. Removal is unordered: the
/// last slot is swapped into the removed one, keeping the arrays dense.
///
/// The cached `aabb` is the union of all slot bounds. When an item moves in place, the
/// cached union becomes a (still valid) superset and the leaf is flagged dirty; the
/// exact union is recomputed by the next batched [`Bvh::refit`](super::Bvh::refit).
#[derive(Clone, Debug)]
pub struct BvhLeaf {
    pub(super) aabb: Aabb,
    pub(super) dirty: bool,
    pub(super) items: ArrayVec<u32, LEAF_MAX_ITEMS>,
    pub(super) aabbs: ArrayVec<Aabb, LEAF_MAX_ITEMS>,
}

impl BvhLeaf {
    /// An empty leaf.
    pub(super) fn new() -> Self {
        Self {
            aabb: Aabb::new_invalid(),
            dirty: false,
            items: ArrayVec::new(),
            aabbs: ArrayVec::new(),
        }
    }

    /// A leaf holding a single item.
    pub(super) fn with_item(item: u32, aabb: Aabb) -> Self {
        let mut leaf = Self::new();
        let _ = leaf.request_item(item, aabb);
        leaf.aabb = aabb;
        leaf
    }

    /// The number of items currently stored in this leaf.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Does this leaf hold no item?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Is this leaf filled to capacity?
    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Does this leaf need its cached bound recomputed?
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub(super) fn set_dirty(&mut self) {
        self.dirty = true;
    }

    #[inline]
    pub(super) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Claims a new slot for the given item and bound, returning the slot index.
    ///
    /// Panics if the leaf is already full: callers must check [`Self::is_full`] first
    /// and start a new leaf instead.
    pub(super) fn request_item(&mut self, item: u32, aabb: Aabb) -> usize {
        self.items.push(item);
        self.aabbs.push(aabb);
        self.items.len() - 1
    }

    /// Removes the item at `slot` in O(1) by swapping the last active slot into it.
    ///
    /// Panics if `slot` is outside the `[0, len)` range.
    pub(super) fn remove_item_unordered(&mut self, slot: usize) {
        let _ = self.items.swap_remove(slot);
        let _ = self.aabbs.swap_remove(slot);
    }

    /// The id of the item stored at the given slot.
    #[inline]
    pub fn item_id(&self, slot: usize) -> u32 {
        self.items[slot]
    }

    /// The (expanded) bound of the item stored at the given slot.
    #[inline]
    pub fn item_aabb(&self, slot: usize) -> &Aabb {
        &self.aabbs[slot]
    }

    #[inline]
    pub(super) fn set_item_aabb(&mut self, slot: usize, aabb: Aabb) {
        self.aabbs[slot] = aabb;
    }

    /// The slot currently holding the given item, if any.
    pub(super) fn position_of(&self, item: u32) -> Option<usize> {
        self.items.iter().position(|id| *id == item)
    }

    /// The exact union of all slot bounds ([`Aabb::new_invalid`] when empty).
    pub(super) fn compute_union(&self) -> Aabb {
        let mut union = Aabb::new_invalid();
        for aabb in &self.aabbs {
            union.merge(aabb);
        }
        union
    }
}
