//! Spatial partitioning tools.

pub use self::bvh::{
    Bvh, BvhItemData, BvhLeaf, BvhNode, BvhNodeKind, CullParams, DEFAULT_MARGIN, LEAF_MAX_ITEMS,
};

pub mod bvh;
