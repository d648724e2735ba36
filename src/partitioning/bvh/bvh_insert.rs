use super::bvh_node::{BvhNode, BvhNodeKind};
use super::{Bvh, BvhLeaf, NONE};
use crate::bounding_volume::BoundingVolume;
use crate::math::Real;

impl Bvh {
    /// Attaches a detached item under its sub-tree root.
    ///
    /// The descent picks, at every internal node, the child whose bound grows the
    /// least when absorbing the item (surface-area heuristic), stopping early when
    /// creating a fresh sibling right here is cheaper than descending further. Ties
    /// descend into the left child so repeated runs build identical trees.
    pub(super) fn attach_item(&mut self, item: u32) {
        let tree = self.items[item as usize].tree;
        let expanded = self.items[item as usize].expanded;

        let root = self.roots[tree];
        if root == NONE {
            let leaf = self.alloc_leaf(BvhLeaf::with_item(item, expanded));
            let node = self.alloc_node(BvhNode::new_leaf(leaf, expanded));
            self.items[item as usize].node = node;
            self.roots[tree] = node;
            return;
        }

        // Find the best host leaf or sibling for the new item.
        let mut index = root;
        loop {
            let node = &self.nodes[index as usize];
            let BvhNodeKind::Internal { children } = node.kind else {
                break;
            };
            let [child1, child2] = children;

            let area = node.aabb.measure();
            let combined_area = node.aabb.merged(&expanded).measure();

            // Cost of pairing the item with this whole sub-tree.
            let cost = 2.0 * combined_area;
            // Minimum cost of pushing the item further down the tree.
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost1 = self.descend_cost(child1, item, inheritance_cost);
            let cost2 = self.descend_cost(child2, item, inheritance_cost);

            if cost < cost1 && cost < cost2 {
                break;
            }

            index = if cost1 <= cost2 { child1 } else { child2 };
        }

        // If we stopped on a leaf node with a free slot, the item joins that leaf.
        if let BvhNodeKind::LeafRef { leaf } = self.nodes[index as usize].kind {
            if !self.leaves[leaf as usize].is_full() {
                let leaf_store = &mut self.leaves[leaf as usize];
                let _ = leaf_store.request_item(item, expanded);
                leaf_store.aabb.merge(&expanded);
                let leaf_aabb = leaf_store.aabb;

                self.nodes[index as usize].aabb = leaf_aabb;
                self.items[item as usize].node = index;

                let parent = self.nodes[index as usize].parent;
                if parent != NONE {
                    self.refit_from(parent);
                }
                return;
            }
        }

        // Otherwise the item starts a fresh leaf, promoted next to the chosen
        // sibling under a new internal node.
        let leaf = self.alloc_leaf(BvhLeaf::with_item(item, expanded));
        let leaf_node = self.alloc_node(BvhNode::new_leaf(leaf, expanded));
        self.items[item as usize].node = leaf_node;

        let old_parent = self.nodes[index as usize].parent;
        let merged = self.nodes[index as usize].aabb.merged(&expanded);
        let height = self.nodes[index as usize].height + 1;
        let new_parent = self.alloc_node(BvhNode {
            aabb: merged,
            parent: old_parent,
            height,
            kind: BvhNodeKind::Internal {
                children: [index, leaf_node],
            },
        });

        if old_parent == NONE {
            self.roots[tree] = new_parent;
        } else {
            self.nodes[old_parent as usize].replace_child(index, new_parent);
        }

        self.nodes[index as usize].parent = new_parent;
        self.nodes[leaf_node as usize].parent = new_parent;

        self.refit_from(new_parent);
    }

    /// The cost of descending into `child` to insert `item` below it.
    fn descend_cost(&self, child: u32, item: u32, inheritance_cost: Real) -> Real {
        let expanded = &self.items[item as usize].expanded;
        let node = &self.nodes[child as usize];
        let combined_area = node.aabb.merged(expanded).measure();

        match node.kind {
            // A leaf with a free slot absorbs the item directly.
            BvhNodeKind::LeafRef { leaf } if !self.leaves[leaf as usize].is_full() => {
                combined_area - node.aabb.measure() + inheritance_cost
            }
            // A full leaf behaves like a sub-tree: a new node gets created below.
            BvhNodeKind::LeafRef { .. } => combined_area + inheritance_cost,
            BvhNodeKind::Internal { .. } => {
                combined_area - node.aabb.measure() + inheritance_cost
            }
        }
    }
}
