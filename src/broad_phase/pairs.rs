use bitflags::bitflags;

bitflags! {
    /// Broad-phase object categories, used to build the pairing filter words.
    ///
    /// A static object carries the [`ObjectType::STATIC`] type bit and a mask that
    /// only recognizes [`ObjectType::DYNAMIC`], so two static objects never pass the
    /// symmetric mask test and never generate pair events, however long they overlap.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ObjectType: u32 {
        /// Moving objects, paired against everything.
        const DYNAMIC = 1 << 0;
        /// Non-moving objects, paired against dynamic objects only.
        const STATIC = 1 << 1;
    }
}

/// Identifies one side of a pair event: the owner id and subindex the object was
/// created with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// The owner id supplied to [`BroadPhase::create`](super::BroadPhase::create).
    pub owner: u32,
    /// The subindex supplied to [`BroadPhase::create`](super::BroadPhase::create).
    pub subindex: u32,
}

/// A callback invoked when two objects start overlapping.
pub type PairCallback = Box<dyn FnMut(ObjectRef, ObjectRef)>;

/// A callback invoked when two previously-paired objects stop overlapping.
pub type UnpairCallback = Box<dyn FnMut(ObjectRef, ObjectRef)>;

#[derive(Copy, Clone, Debug)]
pub(super) enum PairEventKind {
    Pair,
    Unpair,
}

/// A pair transition buffered during pair maintenance and dispatched to the
/// callbacks once the bookkeeping settled.
#[derive(Copy, Clone, Debug)]
pub(super) struct PairEvent {
    pub kind: PairEventKind,
    pub a: ObjectRef,
    pub b: ObjectRef,
}
