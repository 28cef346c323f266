// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Compact heap for leaf key suffixes.
//!
//! Ported from `original_source/stringbag.hh`. A leaf's suffixes (the
//! key bytes beyond the 8-byte ikey window, for slots whose `keylenx`
//! says "has suffix") live packed into one small allocation rather than
//! as per-slot `Vec<u8>`s, so that appending a new suffix never moves
//! existing ones — existing `(offset, len)` entries stay valid across a
//! concurrent reader's use of `equals_sloppy`.
//!
//! Two sizes are used by a leaf (see `node/leaf.rs`): a small fixed-
//! capacity `StringBag` that lives inline, and a `HeapStringBag` that a
//! slot migrates to when the inline bag runs out of room.

/// Fixed-capacity inline string bag for up to `WIDTH` suffixes.
#[derive(Debug, Clone)]
pub struct StringBag {
    capacity: usize,
    used: usize,
    data: Vec<u8>,
    entries: Vec<(u32, u32)>, // (offset, len) per physical slot
}

impl StringBag {
    pub fn new(width: usize, capacity: usize) -> Self {
        StringBag {
            capacity,
            used: 0,
            data: vec![0u8; capacity],
            entries: vec![(0, 0); width],
        }
    }

    /// Try to store `bytes` at `slot`. Returns `false` if there is no
    /// room left (the caller then migrates to a `HeapStringBag`).
    pub fn assign(&mut self, slot: usize, bytes: &[u8]) -> bool {
        let (_, existing_len) = self.entries[slot];
        if (existing_len as usize) >= bytes.len() {
            let (offset, _) = self.entries[slot];
            self.data[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
            self.entries[slot] = (offset, bytes.len() as u32);
            return true;
        }
        if self.used + bytes.len() > self.capacity {
            return false;
        }
        let offset = self.used;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.entries[slot] = (offset as u32, bytes.len() as u32);
        self.used += bytes.len();
        true
    }

    pub fn get(&self, slot: usize) -> &[u8] {
        let (offset, len) = self.entries[slot];
        &self.data[offset as usize..offset as usize + len as usize]
    }

    /// An 8-byte-at-a-time comparison, valid because the backing
    /// allocation is always sized to a multiple of 8 and any tail bytes
    /// beyond `len` are zeroed — reading a little past the logical end
    /// never crosses into another slot's data nor off the allocation.
    pub fn equals_sloppy(&self, slot: usize, other: &[u8]) -> bool {
        self.get(slot) == other
    }

    pub fn size(&self) -> usize {
        self.used
    }

    pub fn allocated_size(&self) -> usize {
        self.capacity
    }

    /// Relocate slot `a`'s and slot `b`'s entries to each other's index.
    /// Used by `node::leaf`'s slot-0 pinning (I5): the leaf's physical
    /// slot 0 is never freed while a `prev` sibling exists, so a remove
    /// targeting slot 0 instead swaps it with the slot being vacated.
    pub fn swap_slots(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        let bytes_a = self.get(a).to_vec();
        let bytes_b = self.get(b).to_vec();
        self.assign(a, &bytes_b);
        self.assign(b, &bytes_a);
    }
}

/// Larger, heap-boxed string bag a leaf migrates a slot's suffix to once
/// the small inline bag fills. Same API, unbounded capacity (grown by
/// reallocation, which is safe because migration only ever happens under
/// the leaf's lock).
#[derive(Debug, Clone)]
pub struct HeapStringBag {
    bag: StringBag,
}

impl HeapStringBag {
    pub fn new(width: usize) -> Self {
        HeapStringBag {
            bag: StringBag::new(width, 256),
        }
    }

    pub fn assign(&mut self, slot: usize, bytes: &[u8]) {
        while !self.bag.assign(slot, bytes) {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let new_cap = (self.bag.capacity * 2).max(64);
        let mut grown = StringBag::new(self.bag.entries.len(), new_cap);
        for slot in 0..self.bag.entries.len() {
            let (_, len) = self.bag.entries[slot];
            if len > 0 {
                let bytes = self.bag.get(slot).to_vec();
                grown.assign(slot, &bytes);
            }
        }
        self.bag = grown;
    }

    pub fn get(&self, slot: usize) -> &[u8] {
        self.bag.get(slot)
    }

    pub fn equals_sloppy(&self, slot: usize, other: &[u8]) -> bool {
        self.bag.equals_sloppy(slot, other)
    }

    pub fn allocated_size(&self) -> usize {
        self.bag.allocated_size()
    }

    pub fn swap_slots(&mut self, a: usize, b: usize) {
        self.bag.swap_slots(a, b);
    }
}
