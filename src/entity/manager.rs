//! Free-list pool of entity slots.
//!
//! Destroyed slots are recycled LIFO: the most recently freed slot is the next one
//! handed out, which keeps the live slot range compact and cache-friendly under
//! steady churn (create/destroy/create in a tight loop reuses the same handful of
//! slots rather than marching forward through the capacity).

use log::trace;

use crate::bitset::BitSet;
use crate::entity::Entity;

struct Slot {
    generation: u8,
    active: bool,
    bitmask: BitSet,
}

/// Allocates and recycles [`Entity`] slots.
///
/// Owns the only record of which slots are active and what each active entity's
/// component bitmask currently is; `Entity` itself is just `(slot, generation)`.
pub struct EntityManager {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
        }
    }

    /// Pop a slot from the free list if one exists, else allocate a fresh slot at
    /// the tail. Amortized O(1) either way.
    pub fn request_entity_instance(&mut self) -> Entity {
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.active = true;
            slot.bitmask.clear();
            Entity::new(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                active: true,
                bitmask: BitSet::new(),
            });
            Entity::new(slot_idx, 0)
        }
    }

    /// True if `entity` is the live incarnation of its slot.
    pub fn is_active(&self, entity: Entity) -> bool {
        self.slots
            .get(entity.slot() as usize)
            .is_some_and(|s| s.active && s.generation == entity.generation())
    }

    /// First half of destruction: mark the slot inactive and clear its bitmask, but
    /// keep the generation and free list untouched so callbacks fired in between
    /// still see a valid, resolvable handle. Returns `false` (no-op) if `entity` is
    /// already stale or inactive.
    pub fn deactivate(&mut self, entity: Entity) -> bool {
        if !self.is_active(entity) {
            return false;
        }
        let slot = &mut self.slots[entity.slot() as usize];
        slot.active = false;
        slot.bitmask.clear();
        true
    }

    /// Second half of destruction: bump the generation (mod 256) and push the slot
    /// onto the free list for reuse. Must be called after
    /// [`EntityManager::deactivate`] and after any release callback has observed
    /// the pre-bump handle.
    pub fn finalize_release(&mut self, entity: Entity) {
        let slot_idx = entity.slot();
        if let Some(slot) = self.slots.get_mut(slot_idx as usize) {
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(slot_idx);
            trace!("recycled slot {slot_idx}, next generation {}", slot.generation);
        }
    }

    /// The bitmask of owned component type ids for a live entity.
    pub fn bitmask(&self, entity: Entity) -> Option<&BitSet> {
        self.slots
            .get(entity.slot() as usize)
            .filter(|s| s.active && s.generation == entity.generation())
            .map(|s| &s.bitmask)
    }

    /// Mutable access to a live entity's bitmask, for `addComponent`/`removeComponent`.
    pub fn bitmask_mut(&mut self, entity: Entity) -> Option<&mut BitSet> {
        if !self.is_active(entity) {
            return None;
        }
        Some(&mut self.slots[entity.slot() as usize].bitmask)
    }

    pub fn get_entity_by_index(&self, slot: u32) -> Option<Entity> {
        self.slots
            .get(slot as usize)
            .filter(|s| s.active)
            .map(|s| Entity::new(slot, s.generation))
    }

    /// Resolve a packed reference, returning `None` if the slot's current
    /// generation no longer matches (stale reference) or the slot is inactive.
    pub fn get_entity_by_packed_ref(&self, packed: u32) -> Option<Entity> {
        let (slot, generation) = Entity::unpack_raw(packed);
        self.slots
            .get(slot as usize)
            .filter(|s| s.active && s.generation == generation)
            .map(|_| Entity::new(slot, generation))
    }

    /// All currently active entities, in ascending slot order.
    pub fn live_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.active)
            .map(|(idx, s)| Entity::new(idx as u32, s.generation))
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
