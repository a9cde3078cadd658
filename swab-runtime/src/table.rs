// Free-list allocator over indirect table slots.

use std::collections::BTreeSet;

/// Result of [`TableAllocator::alloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: u32,
    /// Number of slots the backing table must grow by before `slot` is usable.
    pub grew_by: u32,
}

/// Tracks which slots of a growable table are free.
///
/// Slot 0 is the null function pointer and is never handed out, whatever
/// the capacity. Capacity doubles whenever no slot is free and is never
/// reclaimed. The lowest free slot is always handed out first.
#[derive(Debug, Clone)]
pub struct TableAllocator {
    capacity: u32,
    /// Slots at or above `next` have never been handed out.
    next: u32,
    /// Released slots below `next`.
    free: BTreeSet<u32>,
}

impl Default for TableAllocator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TableAllocator {
    /// Allocator whose `capacity` slots, except slot 0, are all free.
    pub fn new(capacity: u32) -> Self {
        TableAllocator {
            capacity,
            next: 1,
            free: BTreeSet::new(),
        }
    }

    /// Allocator over an existing table, with `occupied` slots already taken.
    pub fn with_occupied(capacity: u32, occupied: impl IntoIterator<Item = u32>) -> Self {
        let occupied: BTreeSet<u32> = occupied.into_iter().collect();
        TableAllocator {
            capacity,
            next: capacity.max(1),
            free: (1..capacity).filter(|slot| !occupied.contains(slot)).collect(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn free_count(&self) -> usize {
        self.free.len() + self.capacity.saturating_sub(self.next) as usize
    }

    /// Take the lowest free slot, growing if none is left. `None` once the
    /// table index space is used up.
    pub fn alloc(&mut self) -> Option<Allocation> {
        if let Some(slot) = self.free.pop_first() {
            return Some(Allocation { slot, grew_by: 0 });
        }
        let slot = self.next;
        let mut grew_by = 0;
        if slot >= self.capacity {
            // An empty table needs two slots before one is usable.
            let new_capacity = self.capacity.saturating_mul(2).max(2);
            if new_capacity <= slot {
                return None;
            }
            grew_by = new_capacity - self.capacity;
            self.capacity = new_capacity;
        }
        self.next = slot + 1;
        Some(Allocation { slot, grew_by })
    }

    /// Undo `allocation` after the backing table refused it, restoring the
    /// capacity the table still has.
    pub fn rollback(&mut self, allocation: Allocation) {
        if allocation.grew_by == 0 {
            self.free(allocation.slot);
            return;
        }
        self.capacity -= allocation.grew_by;
        self.next = allocation.slot;
    }

    /// Return `slot` to the free set. Returns false if it was not allocated.
    pub fn free(&mut self, slot: u32) -> bool {
        slot != 0 && slot < self.next && self.free.insert(slot)
    }
}
