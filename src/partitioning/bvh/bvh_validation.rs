use super::bvh_node::BvhNodeKind;
use super::bvh_tree::NUM_TREES;
use super::{Bvh, NONE};
use crate::bounding_volume::BoundingVolume;
use crate::utils::hashmap::HashSet;

impl Bvh {
    /// Panics if the tree isn't well-formed.
    ///
    /// The tree is well-formed if it is topologically correct (parent back-references,
    /// heights, arena occupancy all consistent) and geometrically correct (every node
    /// bound contains its children's bounds, and equals their union once no leaf is
    /// dirty anymore).
    ///
    /// This is meant for tests and debugging: it visits the whole tree.
    pub fn assert_well_formed(&self) {
        let mut seen_nodes = HashSet::new();
        let mut seen_items = HashSet::new();
        let mut seen_leaves = 0usize;

        for tree in 0..NUM_TREES {
            let root = self.roots[tree];
            if root == NONE {
                continue;
            }

            assert_eq!(
                self.nodes[root as usize].parent, NONE,
                "root node {} has a parent",
                root
            );

            self.assert_well_formed_recurse(
                root,
                tree,
                &mut seen_nodes,
                &mut seen_items,
                &mut seen_leaves,
            );
        }

        assert_eq!(seen_nodes.len(), self.node_count(), "unreachable nodes exist");
        assert_eq!(seen_items.len(), self.item_count(), "unreachable items exist");
        assert_eq!(seen_leaves, self.leaf_count(), "unreachable leaves exist");
    }

    fn assert_well_formed_recurse(
        &self,
        node_id: u32,
        tree: usize,
        seen_nodes: &mut HashSet<u32>,
        seen_items: &mut HashSet<u32>,
        seen_leaves: &mut usize,
    ) {
        assert!(
            seen_nodes.insert(node_id),
            "detected loop: node {} visited twice",
            node_id
        );

        let node = &self.nodes[node_id as usize];

        match node.kind {
            BvhNodeKind::LeafRef { leaf } => {
                assert_eq!(node.height, 0, "leaf node {} has nonzero height", node_id);

                let leaf = &self.leaves[leaf as usize];
                *seen_leaves += 1;

                assert!(!leaf.is_empty(), "leaf of node {} is empty", node_id);

                for slot in 0..leaf.len() {
                    let item = leaf.item_id(slot);
                    let record = &self.items[item as usize];

                    assert!(
                        seen_items.insert(item),
                        "item {} stored in two leaves",
                        item
                    );
                    assert_eq!(record.node, node_id, "item {} has a wrong node link", item);
                    assert_eq!(record.tree, tree, "item {} is under the wrong root", item);
                    assert_eq!(
                        record.expanded,
                        *leaf.item_aabb(slot),
                        "item {} bound diverged from its leaf slot",
                        item
                    );
                    assert!(
                        node.aabb.contains(leaf.item_aabb(slot)),
                        "leaf node {} does not contain item {}",
                        node_id,
                        item
                    );
                }

                if !leaf.is_dirty() {
                    let union = leaf.compute_union();
                    assert_eq!(
                        leaf.aabb, union,
                        "cached union of clean leaf (node {}) is stale",
                        node_id
                    );
                    assert_eq!(
                        node.aabb, leaf.aabb,
                        "bound of leaf node {} diverged from its leaf",
                        node_id
                    );
                }
            }
            BvhNodeKind::Internal { children } => {
                for &child in &children {
                    let child_node = &self.nodes[child as usize];
                    assert_eq!(
                        child_node.parent, node_id,
                        "node {} has a wrong parent link",
                        child
                    );
                    assert!(
                        node.aabb.contains(&child_node.aabb),
                        "node {} does not contain its child {}",
                        node_id,
                        child
                    );

                    self.assert_well_formed_recurse(
                        child, tree, seen_nodes, seen_items, seen_leaves,
                    );
                }

                let height = 1 + self.nodes[children[0] as usize]
                    .height
                    .max(self.nodes[children[1] as usize].height);
                assert_eq!(node.height, height, "node {} has a stale height", node_id);

                if self.dirty_leaves.is_empty() {
                    let merged = self.nodes[children[0] as usize]
                        .aabb
                        .merged(&self.nodes[children[1] as usize].aabb);
                    assert!(
                        relative_eq!(node.aabb.mins, merged.mins)
                            && relative_eq!(node.aabb.maxs, merged.maxs),
                        "bound of node {} is not the union of its children",
                        node_id
                    );
                }
            }
        }
    }
}
