use std::thread::ThreadId;

use super::handle::Slot;
use super::pairs::{PairEvent, PairEventKind};
use super::{ObjectHandle, ObjectRef, ObjectType, PairCallback, UnpairCallback};
use crate::bounding_volume::Aabb;
use crate::math::{Point, Real};
use crate::partitioning::bvh::pairing_mask_test;
use crate::partitioning::{Bvh, BvhItemData, CullParams};
use thiserror::Error;

/// Configuration of a [`BroadPhase`].
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BroadPhaseSettings {
    /// The margin added around object bounds before they are stored in the tree.
    ///
    /// Movements staying within this margin update the tree in place (no
    /// restructuring), and pair events are computed on the padded bounds, giving
    /// overlap detection a small hysteresis. Must be finite and non-negative.
    pub pairing_expansion: Real,
    /// Whether the caller takes responsibility for cross-thread synchronization.
    ///
    /// The broad-phase never locks internally. When this is `false` (the default),
    /// mutating entry points assert in debug builds that they run on the thread that
    /// created the broad-phase, surfacing accidental cross-thread use early. Set it
    /// to `true` when the instance is deliberately shared behind an external lock.
    pub thread_safe: bool,
}

impl Default for BroadPhaseSettings {
    fn default() -> Self {
        Self {
            pairing_expansion: crate::partitioning::DEFAULT_MARGIN,
            thread_safe: false,
        }
    }
}

/// Error returned when [`BroadPhase::with_settings`] rejects its input.
#[derive(Copy, Clone, Debug, PartialEq, Error)]
pub enum SettingsError {
    /// The pairing expansion margin must be finite and non-negative.
    #[error("invalid pairing expansion margin: {0}")]
    InvalidExpansion(Real),
}

/// The broad-phase: a thin id-translation layer over the BVH, plus pair bookkeeping.
///
/// Callers manipulate objects through stable generational [`ObjectHandle`]s while the
/// tree is free to reuse its internal ids. The adapter tracks which objects moved
/// since the last [`BroadPhase::update`] call and, once per update, fires the pair
/// callback for every couple of objects that started overlapping and the unpair
/// callback for every couple that stopped.
///
/// Objects are either dynamic or static. Both kinds live in the pairable partition of
/// the tree; static objects simply carry a mask that never matches another static
/// object, so a scene full of static geometry generates no pair traffic at all.
pub struct BroadPhase {
    tree: Bvh,
    /// Slot 0 is reserved so external handles can treat index 0 as null.
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    /// Maps tree item ids back to slot indices (0 = unused).
    item_to_slot: Vec<u32>,
    /// Slots awaiting pair re-evaluation at the next `update()`.
    changed: Vec<u32>,
    cull_scratch: Vec<u32>,
    pair_callback: Option<PairCallback>,
    unpair_callback: Option<UnpairCallback>,
    settings: BroadPhaseSettings,
    home_thread: Option<ThreadId>,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase {
    /// A new broad-phase with default settings.
    pub fn new() -> Self {
        Self::new_unchecked(BroadPhaseSettings::default())
    }

    /// A new broad-phase with the given settings.
    pub fn with_settings(settings: BroadPhaseSettings) -> Result<Self, SettingsError> {
        if !settings.pairing_expansion.is_finite() || settings.pairing_expansion < 0.0 {
            return Err(SettingsError::InvalidExpansion(settings.pairing_expansion));
        }

        Ok(Self::new_unchecked(settings))
    }

    fn new_unchecked(settings: BroadPhaseSettings) -> Self {
        Self {
            tree: Bvh::with_margin(settings.pairing_expansion),
            slots: vec![Slot::default()],
            free_slots: Vec::new(),
            item_to_slot: Vec::new(),
            changed: Vec::new(),
            cull_scratch: Vec::new(),
            pair_callback: None,
            unpair_callback: None,
            settings,
            home_thread: (!settings.thread_safe).then(|| std::thread::current().id()),
        }
    }

    /// The settings this broad-phase was created with.
    pub fn settings(&self) -> &BroadPhaseSettings {
        &self.settings
    }

    /// The underlying BVH, for direct culling queries.
    pub fn tree(&self) -> &Bvh {
        &self.tree
    }

    /// The number of live objects.
    pub fn object_count(&self) -> usize {
        self.tree.item_count()
    }

    /// Sets (or clears) the callback fired when two objects start overlapping.
    pub fn set_pair_callback(&mut self, callback: Option<PairCallback>) {
        self.pair_callback = callback;
    }

    /// Sets (or clears) the callback fired when two objects stop overlapping.
    pub fn set_unpair_callback(&mut self, callback: Option<UnpairCallback>) {
        self.unpair_callback = callback;
    }

    /// Adds an object and returns its handle.
    ///
    /// `owner` and `subindex` are opaque to the broad-phase; they are handed back
    /// verbatim in query results and pair events. The object's initial pairs are
    /// discovered by the next [`BroadPhase::update`].
    pub fn create(&mut self, owner: u32, subindex: u32, aabb: &Aabb, is_static: bool) -> ObjectHandle {
        self.check_thread();

        let (pairable_type, pairable_mask) = Self::filter_words(is_static);
        let item = self.tree.insert(
            *aabb,
            BvhItemData {
                owner,
                subindex,
                pairable: true,
                pairable_type,
                pairable_mask,
            },
        );

        let index = if let Some(index) = self.free_slots.pop() {
            index
        } else {
            self.slots.push(Slot::default());
            (self.slots.len() - 1) as u32
        };

        let slot = &mut self.slots[index as usize];
        slot.item = Some(item);
        slot.is_static = is_static;
        let generation = slot.generation;

        if self.item_to_slot.len() <= item as usize {
            self.item_to_slot.resize(item as usize + 1, 0);
        }
        self.item_to_slot[item as usize] = index;

        self.queue_slot(index);

        ObjectHandle { index, generation }
    }

    /// Moves an object to a new bound.
    ///
    /// Small movements (within the pairing expansion margin) are free; larger ones
    /// queue the object for pair re-evaluation at the next [`BroadPhase::update`].
    pub fn move_object(&mut self, handle: ObjectHandle, aabb: &Aabb) {
        self.check_thread();

        let index = self.resolve(handle);
        let item = self.item_of(index);

        if self.tree.set_aabb(item, aabb) {
            self.queue_slot(index);
        }
    }

    /// Removes an object, firing unpair callbacks for all its current pairs.
    ///
    /// The handle becomes stale: any further use of it fails fast.
    pub fn remove(&mut self, handle: ObjectHandle) {
        self.check_thread();

        let index = self.resolve(handle);
        let mut events = Vec::new();

        let partners = self.slots[index as usize].pairs.clone();
        for partner in partners {
            self.break_pair(index, partner, &mut events);
        }

        let slot = &mut self.slots[index as usize];
        let item = slot
            .item
            .take()
            .expect("internal error: resolved slot has no item");
        slot.generation = slot.generation.wrapping_add(1);

        self.item_to_slot[item as usize] = 0;
        self.tree.remove(item);
        self.free_slots.push(index);

        self.dispatch_events(events);
    }

    /// Flags an object as static or dynamic.
    ///
    /// This is a metadata-only update: the object does not move in the tree, only
    /// its pairing filter changes. Pairs invalidated by the new filter (e.g. two
    /// overlapping objects that both became static) dissolve at the next
    /// [`BroadPhase::update`], or immediately through [`BroadPhase::recheck_pairs`].
    pub fn set_static(&mut self, handle: ObjectHandle, is_static: bool) {
        self.check_thread();

        let index = self.resolve(handle);
        if self.slots[index as usize].is_static == is_static {
            return;
        }

        let item = self.item_of(index);
        let (pairable_type, pairable_mask) = Self::filter_words(is_static);
        self.tree.set_pairable_filter(item, pairable_type, pairable_mask);
        self.slots[index as usize].is_static = is_static;
        self.queue_slot(index);
    }

    /// Re-evaluates the pairs of a single object immediately, firing callbacks for
    /// every transition, instead of waiting for the next [`BroadPhase::update`].
    pub fn recheck_pairs(&mut self, handle: ObjectHandle) {
        self.check_thread();

        let index = self.resolve(handle);
        let mut events = Vec::new();
        self.update_pairs_for(index, &mut events);
        self.dispatch_events(events);
    }

    /// Flushes pending pair maintenance. Call this once per logical frame/step.
    ///
    /// This first refits the tree (batched bound recomputation for items that moved
    /// in place), then walks every object whose bound changed since the last update,
    /// firing exactly one pair callback per couple of objects that started
    /// overlapping and one unpair callback per couple that stopped.
    pub fn update(&mut self) {
        self.check_thread();

        self.tree.refit();

        let queued = core::mem::take(&mut self.changed);
        let mut events = Vec::new();

        for &index in &queued {
            self.slots[index as usize].queued = false;
        }
        for index in &queued {
            self.update_pairs_for(*index, &mut events);
        }

        log::trace!(
            "broad-phase update: {} queued objects, {} pair events",
            queued.len(),
            events.len()
        );

        self.dispatch_events(events);
    }

    /// Is this handle still valid (i.e. its object has not been removed)?
    pub fn is_valid_handle(&self, handle: ObjectHandle) -> bool {
        let index = handle.index as usize;
        index != 0
            && index < self.slots.len()
            && self.slots[index].generation == handle.generation
            && self.slots[index].item.is_some()
    }

    /*
     * Queries.
     */

    /// Finds every object whose (expanded) bound intersects `aabb`.
    ///
    /// Owner ids are written to `out_items` and, when provided, the matching
    /// subindices to `out_subindices` (which must be at least as large). Returns the
    /// number of hits written; hits beyond the buffer capacity are silently dropped.
    pub fn cull_aabb(
        &self,
        aabb: &Aabb,
        out_items: &mut [u32],
        out_subindices: Option<&mut [u32]>,
    ) -> usize {
        let count = {
            let mut params = CullParams::new(out_items);
            self.tree.cull_aabb(aabb, &mut params);
            params.result_count()
        };
        self.write_hits(out_items, out_subindices, count)
    }

    /// Finds every object whose (expanded) bound intersects the given segment.
    ///
    /// Same output contract as [`BroadPhase::cull_aabb`].
    pub fn cull_segment(
        &self,
        from: &Point<Real>,
        to: &Point<Real>,
        out_items: &mut [u32],
        out_subindices: Option<&mut [u32]>,
    ) -> usize {
        let count = {
            let mut params = CullParams::new(out_items);
            self.tree.cull_segment(from, to, &mut params);
            params.result_count()
        };
        self.write_hits(out_items, out_subindices, count)
    }

    /// Finds every object whose (expanded) bound contains the given point.
    ///
    /// Same output contract as [`BroadPhase::cull_aabb`].
    pub fn cull_point(
        &self,
        point: &Point<Real>,
        out_items: &mut [u32],
        out_subindices: Option<&mut [u32]>,
    ) -> usize {
        let count = {
            let mut params = CullParams::new(out_items);
            self.tree.cull_point(point, &mut params);
            params.result_count()
        };
        self.write_hits(out_items, out_subindices, count)
    }

    /// Translates the tree item ids sitting in `out_items[..count]` into owner ids
    /// and subindices.
    fn write_hits(
        &self,
        out_items: &mut [u32],
        out_subindices: Option<&mut [u32]>,
        count: usize,
    ) -> usize {
        if let Some(subs) = &out_subindices {
            assert!(
                subs.len() >= out_items.len(),
                "the subindex output buffer must be at least as large as the item buffer"
            );
        }

        let mut out_subindices = out_subindices;
        for i in 0..count {
            let item = out_items[i];
            out_items[i] = self.tree.item_owner(item);
            if let Some(subs) = out_subindices.as_deref_mut() {
                subs[i] = self.tree.item_subindex(item);
            }
        }

        count
    }

    /*
     * Pair maintenance.
     */

    fn filter_words(is_static: bool) -> (u32, u32) {
        if is_static {
            (ObjectType::STATIC.bits(), ObjectType::DYNAMIC.bits())
        } else {
            (
                ObjectType::DYNAMIC.bits(),
                (ObjectType::DYNAMIC | ObjectType::STATIC).bits(),
            )
        }
    }

    fn resolve(&self, handle: ObjectHandle) -> u32 {
        assert!(
            self.is_valid_handle(handle),
            "stale or null broad-phase handle: {:?}",
            handle
        );
        handle.index
    }

    fn item_of(&self, index: u32) -> u32 {
        self.slots[index as usize]
            .item
            .expect("internal error: resolved slot has no item")
    }

    fn queue_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        if !slot.queued {
            slot.queued = true;
            self.changed.push(index);
        }
    }

    fn object_ref(&self, index: u32) -> ObjectRef {
        let item = self.slots[index as usize]
            .item
            .expect("internal error: pair bookkeeping references a free slot");
        ObjectRef {
            owner: self.tree.item_owner(item),
            subindex: self.tree.item_subindex(item),
        }
    }

    /// Removes the pairs of `index` that stopped overlapping (or stopped passing the
    /// mask filter), then registers the overlaps that appeared.
    fn update_pairs_for(&mut self, index: u32, events: &mut Vec<PairEvent>) {
        let Some(item) = self.slots[index as usize].item else {
            // Removed after it was queued.
            return;
        };

        // Leavers first: walk the existing pairs.
        let partners = self.slots[index as usize].pairs.clone();
        for partner in partners {
            if !self.pair_still_valid(index, partner) {
                self.break_pair(index, partner, events);
            }
        }

        // Enterers: cull the pairable partition with this object's expanded bound.
        let aabb = *self.tree.item_expanded_aabb(item);
        let (pairable_type, pairable_mask) = self.tree.item_filter(item);

        let mut scratch = core::mem::take(&mut self.cull_scratch);
        scratch.resize(self.tree.item_count(), 0);

        let count = {
            let mut params = CullParams::new(&mut scratch);
            params.mask = pairable_mask;
            params.pairable_type = pairable_type;
            params.test_pairable_only = true;
            self.tree.cull_aabb(&aabb, &mut params);
            params.result_count()
        };

        for &other_item in &scratch[..count] {
            if other_item == item {
                continue;
            }

            let other_index = self.item_to_slot[other_item as usize];
            debug_assert_ne!(other_index, 0);

            if !self.slots[index as usize].pairs.contains(&other_index) {
                self.make_pair(index, other_index, events);
            }
        }

        self.cull_scratch = scratch;
    }

    fn pair_still_valid(&self, a: u32, b: u32) -> bool {
        let (Some(item_a), Some(item_b)) =
            (self.slots[a as usize].item, self.slots[b as usize].item)
        else {
            return false;
        };

        let (type_a, mask_a) = self.tree.item_filter(item_a);
        let (type_b, mask_b) = self.tree.item_filter(item_b);

        pairing_mask_test(mask_a, type_a, mask_b, type_b)
            && self.tree.items_intersect(item_a, item_b)
    }

    fn make_pair(&mut self, a: u32, b: u32, events: &mut Vec<PairEvent>) {
        self.slots[a as usize].pairs.push(b);
        self.slots[b as usize].pairs.push(a);
        events.push(PairEvent {
            kind: PairEventKind::Pair,
            a: self.object_ref(a),
            b: self.object_ref(b),
        });
    }

    fn break_pair(&mut self, a: u32, b: u32, events: &mut Vec<PairEvent>) {
        // Record the event before the bookkeeping: both ends must still be alive.
        events.push(PairEvent {
            kind: PairEventKind::Unpair,
            a: self.object_ref(a),
            b: self.object_ref(b),
        });

        let slot_a = &mut self.slots[a as usize];
        if let Some(position) = slot_a.pairs.iter().position(|p| *p == b) {
            let _ = slot_a.pairs.swap_remove(position);
        }
        let slot_b = &mut self.slots[b as usize];
        if let Some(position) = slot_b.pairs.iter().position(|p| *p == a) {
            let _ = slot_b.pairs.swap_remove(position);
        }
    }

    fn dispatch_events(&mut self, events: Vec<PairEvent>) {
        for event in events {
            match event.kind {
                PairEventKind::Pair => {
                    if let Some(callback) = self.pair_callback.as_mut() {
                        callback(event.a, event.b);
                    }
                }
                PairEventKind::Unpair => {
                    if let Some(callback) = self.unpair_callback.as_mut() {
                        callback(event.a, event.b);
                    }
                }
            }
        }
    }

    fn check_thread(&self) {
        if let Some(home) = self.home_thread {
            if cfg!(debug_assertions) {
                assert_eq!(
                    std::thread::current().id(),
                    home,
                    "broad-phase mutated from a thread other than its creator \
                     (enable `thread_safe` in the settings to lift this check)"
                );
            }
        }
    }
}
