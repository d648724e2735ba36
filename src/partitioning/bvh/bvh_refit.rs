use super::{Bvh, NONE};
use crate::bounding_volume::{Aabb, BoundingVolume};

impl Bvh {
    /// Moves an item to a new bound.
    ///
    /// Returns `false` when the new bound still fits inside the item's stored
    /// margin-expanded bound: nothing changes at all, which makes repeated calls with
    /// an identical bound free. Otherwise the expanded bound is recomputed and the
    /// call returns `true`; the item is updated in place (and its leaf marked dirty)
    /// when the new expanded bound still fits the leaf node's bound, or removed and
    /// reinserted when it does not.
    ///
    /// Panics if the id does not identify a live item.
    pub fn set_aabb(&mut self, item: u32, aabb: &Aabb) -> bool {
        if self.item(item).expanded.contains(aabb) {
            return false;
        }

        let expanded = aabb.loosened(self.margin);
        let node_id = self.item(item).node;

        if self.nodes[node_id as usize].aabb.contains(&expanded) {
            // In-place update: the leaf bound still covers the item. The leaf union
            // is now a superset of its items, tightened by the next refit.
            let leaf_id = self.nodes[node_id as usize].leaf_id();
            let leaf = &mut self.leaves[leaf_id as usize];
            let slot = leaf
                .position_of(item)
                .unwrap_or_else(|| panic!("BVH item {} is missing from its leaf", item));
            leaf.set_item_aabb(slot, expanded);

            if !leaf.is_dirty() {
                leaf.set_dirty();
                self.dirty_leaves.push(leaf_id);
            }

            self.items[item as usize].expanded = expanded;
        } else {
            self.detach_item(item);
            self.items[item as usize].expanded = expanded;
            self.attach_item(item);
        }

        true
    }

    /// Recomputes the bounds of all leaves marked dirty by in-place moves, and
    /// propagates the changes to their ancestors.
    ///
    /// In-place moves only flag their leaf instead of refitting immediately, so a
    /// frame where many items move pays a single batched pass here rather than one
    /// ancestor walk per item. The broad-phase calls this once per `update()`.
    pub fn refit(&mut self) {
        let dirty = core::mem::take(&mut self.dirty_leaves);

        for leaf_id in dirty {
            let leaf = &mut self.leaves[leaf_id as usize];
            if !leaf.is_dirty() {
                // The leaf was emptied (and possibly reused) since it was queued.
                continue;
            }

            leaf.clear_dirty();
            let union = leaf.compute_union();
            if union == leaf.aabb {
                continue;
            }
            leaf.aabb = union;

            // A dirty leaf is never empty, so its first item locates its node.
            let node_id = self.items[leaf.items[0] as usize].node;
            self.nodes[node_id as usize].aabb = union;

            let parent = self.nodes[node_id as usize].parent;
            if parent != NONE {
                self.refit_from(parent);
            }
        }
    }
}
