use super::{BvhLeaf, BvhNode, NONE};
use crate::bounding_volume::{Aabb, BoundingVolume};
use crate::math::Real;

/// The default margin added around item bounds before insertion.
///
/// See [`Bvh::with_margin`].
pub const DEFAULT_MARGIN: Real = 0.1;

pub(super) const NUM_TREES: usize = 2;
pub(super) const TREE_NON_PAIRABLE: usize = 0;
pub(super) const TREE_PAIRABLE: usize = 1;

/// The user-provided description of an item inserted into a [`Bvh`].
#[derive(Copy, Clone, Debug)]
pub struct BvhItemData {
    /// An opaque 32-bit id identifying the owner of this item (e.g. a collision
    /// object). Returned as-is by queries.
    pub owner: u32,
    /// A sub-index for owners holding several items (e.g. multi-shape bodies).
    pub subindex: u32,
    /// Whether this item participates in pairing. Pairable and non-pairable items
    /// live under two distinct sub-tree roots so queries can skip either half.
    pub pairable: bool,
    /// The type bits of this item, tested against other items' masks.
    pub pairable_type: u32,
    /// The mask bits of this item, tested against other items' types.
    pub pairable_mask: u32,
}

/// Internal per-item bookkeeping.
#[derive(Copy, Clone, Debug)]
pub(super) struct BvhItem {
    /// The leaf node currently holding this item, or the sentinel when detached.
    pub node: u32,
    /// The margin-expanded bound stored in the tree for this item.
    pub expanded: Aabb,
    pub owner: u32,
    pub subindex: u32,
    /// Which sub-tree root the item lives under.
    pub tree: usize,
    pub pairable_type: u32,
    pub pairable_mask: u32,
}

/// A dynamic bounding volume hierarchy for broad-phase collision detection and culling.
///
/// The tree owns three arenas (nodes, fixed-capacity leaves, and item records), each
/// with a free-list so slots are reclaimed on removal. Items are partitioned under two
/// sub-tree roots: one for pairable items and one for non-pairable items, so queries
/// that only care about one class can skip the other entirely.
///
/// Bounds handed to [`Bvh::insert`] are enlarged by the configured margin before being
/// stored; [`Bvh::set_aabb`] uses that slack to turn small movements into O(1) in-place
/// updates instead of tree restructurings.
#[derive(Clone, Debug)]
pub struct Bvh {
    pub(super) nodes: Vec<BvhNode>,
    pub(super) free_nodes: Vec<u32>,
    pub(super) leaves: Vec<BvhLeaf>,
    pub(super) free_leaves: Vec<u32>,
    pub(super) items: Vec<BvhItem>,
    pub(super) free_items: Vec<u32>,
    pub(super) roots: [u32; NUM_TREES],
    pub(super) dirty_leaves: Vec<u32>,
    pub(super) margin: Real,
}

impl Default for Bvh {
    fn default() -> Self {
        Self::new()
    }
}

impl Bvh {
    /// An empty BVH with the default margin.
    pub fn new() -> Self {
        Self::with_margin(DEFAULT_MARGIN)
    }

    /// An empty BVH expanding every inserted bound by the given margin.
    ///
    /// The margin must be finite and non-negative. A larger margin makes small
    /// movements cheaper (they stay within the expanded bound) at the price of
    /// looser bounds, i.e. more false positives to filter in the narrow phase.
    pub fn with_margin(margin: Real) -> Self {
        assert!(
            margin.is_finite() && margin >= 0.0,
            "the BVH margin must be finite and non-negative"
        );

        Self {
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            leaves: Vec::new(),
            free_leaves: Vec::new(),
            items: Vec::new(),
            free_items: Vec::new(),
            roots: [NONE; NUM_TREES],
            dirty_leaves: Vec::new(),
            margin,
        }
    }

    /// The margin added around inserted bounds.
    #[inline]
    pub fn margin(&self) -> Real {
        self.margin
    }

    /// Inserts a new item and returns its id.
    ///
    /// The id stays valid until [`Bvh::remove`] is called for it, after which it may
    /// be reused by a later insertion.
    pub fn insert(&mut self, aabb: Aabb, data: BvhItemData) -> u32 {
        let expanded = aabb.loosened(self.margin);
        let record = BvhItem {
            node: NONE,
            expanded,
            owner: data.owner,
            subindex: data.subindex,
            tree: if data.pairable {
                TREE_PAIRABLE
            } else {
                TREE_NON_PAIRABLE
            },
            pairable_type: data.pairable_type,
            pairable_mask: data.pairable_mask,
        };

        let item = self.alloc_item(record);
        self.attach_item(item);
        item
    }

    /// Removes an item, reclaiming its id.
    ///
    /// Panics if the id does not identify a live item.
    pub fn remove(&mut self, item: u32) {
        self.detach_item(item);
        self.free_items.push(item);
    }

    /// Changes which pairing class an item belongs to, along with its filter words.
    ///
    /// When the `pairable` flag actually changes, the item is moved under the other
    /// sub-tree root (a remove + reinsert). Otherwise this is a metadata update only.
    pub fn set_pairable(
        &mut self,
        item: u32,
        pairable: bool,
        pairable_type: u32,
        pairable_mask: u32,
    ) {
        let tree = if pairable {
            TREE_PAIRABLE
        } else {
            TREE_NON_PAIRABLE
        };

        let record = self.item_mut(item);
        record.pairable_type = pairable_type;
        record.pairable_mask = pairable_mask;

        if record.tree != tree {
            self.detach_item(item);
            self.items[item as usize].tree = tree;
            self.attach_item(item);
        }
    }

    /// Updates an item's filter words without touching the tree structure.
    pub fn set_pairable_filter(&mut self, item: u32, pairable_type: u32, pairable_mask: u32) {
        let record = self.item_mut(item);
        record.pairable_type = pairable_type;
        record.pairable_mask = pairable_mask;
    }

    /// The owner id the item was inserted with.
    #[inline]
    pub fn item_owner(&self, item: u32) -> u32 {
        self.item(item).owner
    }

    /// The subindex the item was inserted with.
    #[inline]
    pub fn item_subindex(&self, item: u32) -> u32 {
        self.item(item).subindex
    }

    /// The `(pairable_type, pairable_mask)` filter words of the item.
    #[inline]
    pub fn item_filter(&self, item: u32) -> (u32, u32) {
        let record = self.item(item);
        (record.pairable_type, record.pairable_mask)
    }

    /// Is the item stored under the pairable sub-tree root?
    #[inline]
    pub fn item_is_pairable(&self, item: u32) -> bool {
        self.item(item).tree == TREE_PAIRABLE
    }

    /// The margin-expanded bound currently stored for the item.
    #[inline]
    pub fn item_expanded_aabb(&self, item: u32) -> &Aabb {
        &self.item(item).expanded
    }

    /// Do the expanded bounds of two items intersect?
    #[inline]
    pub fn items_intersect(&self, item1: u32, item2: u32) -> bool {
        self.item(item1)
            .expanded
            .intersects(&self.item(item2).expanded)
    }

    /// The number of live items.
    pub fn item_count(&self) -> usize {
        self.items.len() - self.free_items.len()
    }

    /// The number of live nodes (internal and leaf nodes).
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free_nodes.len()
    }

    /// The number of live leaves.
    pub fn leaf_count(&self) -> usize {
        self.leaves.len() - self.free_leaves.len()
    }

    /// Does this tree contain no item at all?
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }

    /*
     * Internal bookkeeping.
     */

    #[inline]
    pub(super) fn item(&self, item: u32) -> &BvhItem {
        let record = &self.items[item as usize];
        assert!(record.node != NONE, "use of a removed BVH item id: {}", item);
        record
    }

    #[inline]
    pub(super) fn item_mut(&mut self, item: u32) -> &mut BvhItem {
        let record = &mut self.items[item as usize];
        assert!(record.node != NONE, "use of a removed BVH item id: {}", item);
        record
    }

    pub(super) fn alloc_item(&mut self, record: BvhItem) -> u32 {
        if let Some(id) = self.free_items.pop() {
            self.items[id as usize] = record;
            id
        } else {
            self.items.push(record);
            (self.items.len() - 1) as u32
        }
    }

    pub(super) fn alloc_node(&mut self, node: BvhNode) -> u32 {
        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id as usize] = node;
            id
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    pub(super) fn alloc_leaf(&mut self, leaf: BvhLeaf) -> u32 {
        if let Some(id) = self.free_leaves.pop() {
            self.leaves[id as usize] = leaf;
            id
        } else {
            self.leaves.push(leaf);
            (self.leaves.len() - 1) as u32
        }
    }

    /// Removes an item from its leaf, unlinking and reclaiming the leaf and its node
    /// if it becomes empty. The item record itself is kept (marked detached) so the
    /// item can be re-attached elsewhere.
    pub(super) fn detach_item(&mut self, item: u32) {
        let node_id = self.item(item).node;
        let leaf_id = self.nodes[node_id as usize].leaf_id();

        let leaf = &mut self.leaves[leaf_id as usize];
        let slot = leaf
            .position_of(item)
            .unwrap_or_else(|| panic!("BVH item {} is missing from its leaf", item));
        leaf.remove_item_unordered(slot);
        self.items[item as usize].node = NONE;

        if leaf.is_empty() {
            leaf.clear_dirty();
            self.free_leaves.push(leaf_id);
            self.detach_node(node_id);
        } else {
            // The union is exact again after this, even if the leaf was dirty.
            leaf.clear_dirty();
            let union = leaf.compute_union();
            leaf.aabb = union;
            self.nodes[node_id as usize].aabb = union;

            let parent = self.nodes[node_id as usize].parent;
            if parent != NONE {
                self.refit_from(parent);
            }
        }
    }

    /// Unlinks a leaf node from the tree, promoting its sibling into the parent slot.
    pub(super) fn detach_node(&mut self, node_id: u32) {
        let parent = self.nodes[node_id as usize].parent;

        if parent == NONE {
            self.replace_root(node_id, NONE);
            self.free_nodes.push(node_id);
            return;
        }

        let children = self.nodes[parent as usize].children();
        let sibling = if children[0] == node_id {
            children[1]
        } else {
            children[0]
        };

        let grandparent = self.nodes[parent as usize].parent;
        if grandparent == NONE {
            self.replace_root(parent, sibling);
            self.nodes[sibling as usize].parent = NONE;
        } else {
            self.nodes[grandparent as usize].replace_child(parent, sibling);
            self.nodes[sibling as usize].parent = grandparent;
        }

        self.free_nodes.push(parent);
        self.free_nodes.push(node_id);

        if grandparent != NONE {
            self.refit_from(grandparent);
        }
    }

    /// Replaces the root entry currently holding `old` by `new`.
    pub(super) fn replace_root(&mut self, old: u32, new: u32) {
        if self.roots[TREE_NON_PAIRABLE] == old {
            self.roots[TREE_NON_PAIRABLE] = new;
        } else {
            debug_assert_eq!(self.roots[TREE_PAIRABLE], old);
            self.roots[TREE_PAIRABLE] = new;
        }
    }
}
