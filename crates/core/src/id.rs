// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slot allocation for small scheduler-owned identifiers (trigger ids, batch ids)

use std::collections::BTreeSet;

/// Hands out the lowest free id in `0..limit`.
///
/// Owned by whoever owns the registry the ids index into; released ids are
/// reused before the high-water mark grows.
#[derive(Debug, Clone)]
pub struct SlotAllocator {
    next: u32,
    free: BTreeSet<u32>,
    limit: u32,
}

impl SlotAllocator {
    pub fn new(limit: u32) -> Self {
        Self {
            next: 0,
            free: BTreeSet::new(),
            limit,
        }
    }

    /// Allocate an id, or `None` when every slot is in use
    pub fn alloc(&mut self) -> Option<u32> {
        if let Some(id) = self.free.pop_first() {
            return Some(id);
        }
        if self.next >= self.limit {
            return None;
        }
        let id = self.next;
        self.next += 1;
        Some(id)
    }

    /// Return an id to the pool. Returns false if it was not allocated.
    pub fn release(&mut self, id: u32) -> bool {
        if id >= self.next || self.free.contains(&id) {
            return false;
        }
        if id + 1 == self.next {
            self.next -= 1;
            // Fold trailing free slots back into the high-water mark
            while self.next > 0 && self.free.remove(&(self.next - 1)) {
                self.next -= 1;
            }
        } else {
            self.free.insert(id);
        }
        true
    }

    /// Number of ids currently allocated
    pub fn in_use(&self) -> usize {
        self.next as usize - self.free.len()
    }
}

impl Default for SlotAllocator {
    fn default() -> Self {
        Self::new(u32::MAX)
    }
}
