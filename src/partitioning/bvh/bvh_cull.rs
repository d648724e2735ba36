use super::bvh_node::BvhNodeKind;
use super::bvh_tree::{NUM_TREES, TREE_NON_PAIRABLE, TREE_PAIRABLE};
use super::{Bvh, NONE};
use crate::bounding_volume::{Aabb, BoundingVolume, Plane};
use crate::math::{Point, Real};
use smallvec::SmallVec;

const TRAVERSAL_STACK_SIZE: usize = 32;

/// The symmetric pairing filter: two parties match when either mask recognizes the
/// other's type bits.
#[inline]
pub(crate) fn pairing_mask_test(mask1: u32, type1: u32, mask2: u32, type2: u32) -> bool {
    (mask1 & type2) != 0 || (mask2 & type1) != 0
}

/// The per-call context of a culling query.
///
/// This bundles the caller-provided output buffer with the result counters and the
/// filtering words. It is constructed fresh for every query and never persisted.
///
/// Hits beyond the buffer capacity are silently dropped (a documented contract, not
/// an error): callers size the buffer, and [`CullParams::result_count_overall`] keeps
/// counting past capacity so truncation is detectable.
pub struct CullParams<'a> {
    results: &'a mut [u32],
    result_count: usize,
    result_count_overall: usize,
    /// Mask bits tested against candidate items' type bits.
    pub mask: u32,
    /// Type bits tested against candidate items' mask bits.
    ///
    /// The default `mask == u32::MAX` with `pairable_type == 0` disables filtering
    /// entirely so plain geometric queries see every item.
    pub pairable_type: u32,
    /// When set, the query only traverses the pairable sub-tree, skipping every
    /// non-pairable item without visiting its half of the structure.
    pub test_pairable_only: bool,
}

impl<'a> CullParams<'a> {
    /// A new, unfiltered query context writing hits into `results`.
    pub fn new(results: &'a mut [u32]) -> Self {
        Self {
            results,
            result_count: 0,
            result_count_overall: 0,
            mask: u32::MAX,
            pairable_type: 0,
            test_pairable_only: false,
        }
    }

    /// The number of hits written to the output buffer.
    #[inline]
    pub fn result_count(&self) -> usize {
        self.result_count
    }

    /// The number of hits found, including those dropped once the buffer was full.
    #[inline]
    pub fn result_count_overall(&self) -> usize {
        self.result_count_overall
    }

    /// The hits written so far.
    #[inline]
    pub fn results(&self) -> &[u32] {
        &self.results[..self.result_count]
    }

    /// Does an item with the given filter words pass this query's filter?
    #[inline]
    fn accepts(&self, item_type: u32, item_mask: u32) -> bool {
        if self.mask == u32::MAX && self.pairable_type == 0 {
            // Unfiltered query.
            return true;
        }

        pairing_mask_test(self.mask, self.pairable_type, item_mask, item_type)
    }

    fn push(&mut self, item: u32) {
        self.result_count_overall += 1;
        if self.result_count < self.results.len() {
            self.results[self.result_count] = item;
            self.result_count += 1;
        } else if self.result_count_overall == self.results.len() + 1 {
            log::trace!(
                "cull result buffer full ({} slots), truncating",
                self.results.len()
            );
        }
    }
}

impl Bvh {
    /// Finds every item whose stored (margin-expanded) bound intersects `aabb`.
    pub fn cull_aabb(&self, aabb: &Aabb, params: &mut CullParams<'_>) {
        self.cull_with(params, |bound| bound.intersects(aabb));
    }

    /// Finds every item whose stored bound intersects the segment from `from` to `to`.
    pub fn cull_segment(&self, from: &Point<Real>, to: &Point<Real>, params: &mut CullParams<'_>) {
        self.cull_with(params, |bound| bound.intersects_segment(from, to));
    }

    /// Finds every item whose stored bound contains the given point.
    pub fn cull_point(&self, point: &Point<Real>, params: &mut CullParams<'_>) {
        self.cull_with(params, |bound| bound.contains_local_point(point));
    }

    /// Finds every item whose stored bound intersects the convex region delimited by
    /// the given outward-normal planes (e.g. a view frustum).
    pub fn cull_convex(&self, planes: &[Plane], params: &mut CullParams<'_>) {
        self.cull_with(params, |bound| bound.intersects_planes(planes));
    }

    /// Iterative stack-based descent shared by all culling queries.
    ///
    /// `test` is evaluated against internal node bounds (to prune sub-trees) and
    /// against individual item bounds (to emit hits).
    fn cull_with(&self, params: &mut CullParams<'_>, test: impl Fn(&Aabb) -> bool) {
        let first_tree = if params.test_pairable_only {
            TREE_PAIRABLE
        } else {
            TREE_NON_PAIRABLE
        };

        let mut stack: SmallVec<[u32; TRAVERSAL_STACK_SIZE]> = SmallVec::new();

        for tree in first_tree..NUM_TREES {
            let root = self.roots[tree];
            if root == NONE {
                continue;
            }

            stack.push(root);

            while let Some(id) = stack.pop() {
                let node = &self.nodes[id as usize];
                if !test(&node.aabb) {
                    continue;
                }

                match node.kind {
                    BvhNodeKind::Internal { children } => {
                        stack.push(children[0]);
                        stack.push(children[1]);
                    }
                    BvhNodeKind::LeafRef { leaf } => {
                        let leaf = &self.leaves[leaf as usize];
                        for slot in 0..leaf.len() {
                            let item = leaf.item_id(slot);
                            let record = &self.items[item as usize];
                            if params.accepts(record.pairable_type, record.pairable_mask)
                                && test(leaf.item_aabb(slot))
                            {
                                params.push(item);
                            }
                        }
                    }
                }
            }
        }
    }
}
