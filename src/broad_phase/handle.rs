use smallvec::SmallVec;

/// A stable external handle to an object tracked by the broad-phase.
///
/// Handles are generational: the slot index is 1-based (0 is reserved as the null
/// handle) and the generation is bumped every time a slot is reclaimed, so using a
/// handle after [`BroadPhase::remove`](super::BroadPhase::remove) fails fast instead
/// of silently touching whatever object reused the slot.
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub(super) index: u32,
    pub(super) generation: u32,
}

impl ObjectHandle {
    /// The null handle. No live object ever resolves to it.
    pub const NULL: ObjectHandle = ObjectHandle {
        index: 0,
        generation: 0,
    };

    /// Is this the null handle?
    #[inline]
    pub fn is_null(&self) -> bool {
        self.index == 0
    }
}

impl Default for ObjectHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// One slot of the broad-phase object table.
#[derive(Clone, Debug, Default)]
pub(super) struct Slot {
    /// Bumped every time the slot is reclaimed, invalidating old handles.
    pub generation: u32,
    /// The BVH item currently stored in this slot, or `None` for free slots.
    pub item: Option<u32>,
    pub is_static: bool,
    /// Whether the slot is already queued for pair re-evaluation.
    pub queued: bool,
    /// Slots this object is currently paired with.
    pub pairs: SmallVec<[u32; 8]>,
}
