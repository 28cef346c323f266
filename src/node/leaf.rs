// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fan-out-15 leaf node.
//!
//! Ported from `original_source/masstree_struct.hh`'s `leaf<P>`. Each of
//! the `WIDTH` physical slots carries an ikey, a `keylenx` tag (see
//! `node::keylenx`), a value cell, and possibly a string-bag suffix. The
//! `permutation` field names which physical slots are logically live
//! and in what order (`permuter.rs`); readers walk the permutation, not
//! the physical array, so a concurrent writer can fill a new slot
//! before publishing it.

use super::{keylenx, AtomicLink, NodeId, WIDTH};
use crate::permuter::Permuter;
use crate::stringbag::StringBag;
use crate::version::NodeVersion;
use std::sync::atomic::{AtomicU64, Ordering};

/// What a leaf slot's value cell holds.
pub enum LeafValue<V> {
    Value(V),
    Child(NodeId<V>),
    Empty,
}

impl<V> LeafValue<V> {
    fn take(&mut self) -> LeafValue<V> {
        std::mem::replace(self, LeafValue::Empty)
    }
}

#[repr(C)]
pub struct Leaf<V> {
    pub(crate) version: NodeVersion,
    permutation: AtomicU64,
    keylenx: [u8; WIDTH],
    ikey0: [u64; WIDTH],
    lv: Vec<LeafValue<V>>,
    suffixes: StringBag,
    /// Overflow suffix storage, used only once the small inline bag
    /// above has no room left for a new slot's suffix.
    heap_suffixes: Option<crate::stringbag::HeapStringBag>,
    /// Bumped whenever a remove frees a slot; compared against by a
    /// concurrent insert to detect a reused slot (P8).
    node_ts: AtomicU64,
    next: AtomicLink<V>,
    prev: AtomicLink<V>,
    parent: AtomicLink<V>,
    nremoved: u8,
}

/// `nremoved` value meaning "this leaf used to be a layer root and is
/// now empty; a deferred GC callback should collapse its parent slot."
const DELETED_LAYER: u8 = WIDTH as u8 + 1;

impl<V> Leaf<V> {
    pub fn new(is_root: bool) -> Box<Self> {
        let mut lv = Vec::with_capacity(WIDTH);
        for _ in 0..WIDTH {
            lv.push(LeafValue::Empty);
        }
        Box::new(Leaf {
            version: NodeVersion::new(is_root),
            permutation: AtomicU64::new(Permuter::empty().raw()),
            keylenx: [0; WIDTH],
            ikey0: [0; WIDTH],
            lv,
            suffixes: StringBag::new(WIDTH, 512),
            heap_suffixes: None,
            node_ts: AtomicU64::new(super::next_node_timestamp()),
            next: AtomicLink::new(None),
            prev: AtomicLink::new(None),
            parent: AtomicLink::new(None),
            nremoved: 0,
        })
    }

    pub fn permutation(&self) -> Permuter {
        Permuter::from_raw(self.permutation.load(Ordering::Acquire))
    }

    pub(crate) fn publish_permutation(&self, p: Permuter) {
        self.permutation.store(p.raw(), Ordering::Release);
    }

    /// Shrink the live count to `new_size` without touching the
    /// existing field assignments. Used by leaf split: the left half
    /// keeps physical slots `perm.get(0..new_size)` unchanged, and
    /// whatever was at the remaining logical positions becomes the free
    /// tail automatically (their `lv` cells were already moved out by
    /// the caller via `take_raw_slot`).
    pub(crate) fn shrink_permutation_to(&mut self, new_size: usize) {
        let raw = self.permutation().raw();
        self.publish_permutation(Permuter::from_raw((raw & !0xf) | new_size as u64));
    }

    pub fn size(&self) -> usize {
        self.permutation().size()
    }

    pub fn parent(&self) -> Option<NodeId<V>> {
        self.parent.load()
    }

    pub fn set_parent(&self, parent: NodeId<V>) {
        self.parent.store(Some(parent));
    }

    pub fn next(&self) -> Option<NodeId<V>> {
        self.next.load()
    }

    pub fn prev(&self) -> Option<NodeId<V>> {
        self.prev.load()
    }

    pub fn set_next(&self, next: Option<NodeId<V>>) {
        self.next.store(next);
    }

    pub fn set_prev(&self, prev: Option<NodeId<V>>) {
        self.prev.store(prev);
    }

    pub fn node_ts(&self) -> u64 {
        self.node_ts.load(Ordering::Acquire)
    }

    fn bump_node_ts(&self) {
        self.node_ts.fetch_add(1, Ordering::AcqRel);
    }

    /// Slot p's ikey, valid whether or not p is currently live — callers
    /// only read this after confirming liveness via the permutation.
    pub fn ikey(&self, p: usize) -> u64 {
        self.ikey0[p]
    }

    pub fn ikey_bound(&self) -> u64 {
        self.ikey0[self.permutation().get(0)]
    }

    pub fn keylenx(&self, p: usize) -> u8 {
        self.keylenx[p]
    }

    pub fn is_node(&self, p: usize) -> bool {
        keylenx::is_node(self.keylenx[p])
    }

    pub fn is_stable_node(&self, p: usize) -> bool {
        keylenx::is_stable_node(self.keylenx[p])
    }

    pub fn has_suffix(&self, p: usize) -> bool {
        keylenx::has_suffix(self.keylenx[p])
    }

    pub fn suffix(&self, p: usize) -> &[u8] {
        match &self.heap_suffixes {
            Some(heap) if !heap.get(p).is_empty() => heap.get(p),
            _ => self.suffixes.get(p),
        }
    }

    pub fn suffix_equals(&self, p: usize, candidate: &[u8]) -> bool {
        if !self.has_suffix(p) {
            return true;
        }
        match &self.heap_suffixes {
            Some(heap) if !heap.get(p).is_empty() => heap.equals_sloppy(p, candidate),
            _ => self.suffixes.equals_sloppy(p, candidate),
        }
    }

    /// Store `suffix` for `slot`, falling back to (and lazily creating)
    /// the heap-boxed overflow bag once the inline one has no room.
    fn assign_suffix(&mut self, slot: usize, suffix: &[u8]) {
        if self.suffixes.assign(slot, suffix) {
            return;
        }
        let heap = self
            .heap_suffixes
            .get_or_insert_with(|| crate::stringbag::HeapStringBag::new(WIDTH));
        heap.assign(slot, suffix);
    }

    /// Full comparable key view of slot `p`, for binary search and scan.
    pub fn full_ikeylen(&self, p: usize) -> u8 {
        keylenx::ikeylen(self.keylenx[p])
    }

    pub fn value(&self, p: usize) -> Option<&V> {
        match &self.lv[p] {
            LeafValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn value_mut(&mut self, p: usize) -> Option<&mut V> {
        match &mut self.lv[p] {
            LeafValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn child(&self, p: usize) -> Option<NodeId<V>> {
        match &self.lv[p] {
            LeafValue::Child(c) => Some(*c),
            _ => None,
        }
    }

    /// Binary-search the logical order for `ikey`/`ikeylen`/suffix,
    /// returning the matching slot's physical index if present.
    pub fn find(&self, ikey: u64, ikeylen: u8, suffix: &[u8]) -> Option<usize> {
        let perm = self.permutation();
        let mut lo = 0usize;
        let mut hi = perm.size();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let p = perm.get(mid);
            match self.ikey0[p].cmp(&ikey) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => {
                    if self.is_node(p) {
                        return Some(p);
                    }
                    let kl = self.full_ikeylen(p);
                    return match kl.cmp(&ikeylen) {
                        std::cmp::Ordering::Equal if !self.has_suffix(p) => Some(p),
                        _ if self.has_suffix(p) && self.suffix_equals(p, suffix) => Some(p),
                        _ => None,
                    };
                }
            }
        }
        None
    }

    /// Logical position a key with this ikey would occupy (for split
    /// placement and insert position).
    pub fn lower_bound(&self, ikey: u64) -> usize {
        let perm = self.permutation();
        let mut lo = 0usize;
        let mut hi = perm.size();
        while lo < hi {
            let mid = (lo + hi) / 2;
            let p = perm.get(mid);
            if self.ikey0[p] < ikey {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    pub fn is_full(&self) -> bool {
        self.size() == WIDTH
    }

    pub fn deleted_layer(&self) -> bool {
        self.nremoved == DELETED_LAYER
    }

    pub fn mark_deleted_layer(&mut self) {
        self.nremoved = DELETED_LAYER;
    }

    /// Assign a plain value into the slot named by `perm.back()` and
    /// publish the grown permutation at `logical_pos` (the sorted
    /// insertion point among currently-live entries). I5 (physical slot
    /// 0 never freed on a non-leftmost leaf) is upheld entirely by
    /// `remove_at`, not here: since slot 0 is always live on such a
    /// leaf, `perm.back()` can never name it.
    pub fn assign_value(
        &mut self,
        ikey: u64,
        ikeylen: u8,
        suffix: &[u8],
        value: V,
        logical_pos: usize,
    ) -> usize {
        debug_assert!(!self.is_full());
        self.version.mark_inserting();
        let perm = self.permutation();
        let slot = perm.back();
        self.ikey0[slot] = ikey;
        if ikeylen as usize > 8 && !suffix.is_empty() {
            self.keylenx[slot] = keylenx::HAS_SUFFIX;
            self.assign_suffix(slot, suffix);
        } else {
            self.keylenx[slot] = ikeylen;
        }
        self.lv[slot] = LeafValue::Value(value);
        self.publish_permutation(perm.insert_from_back(logical_pos));
        slot
    }

    /// Replace slot `p`'s value in place (same key, no permutation
    /// change needed), returning the value that was there.
    pub fn replace_value(&mut self, p: usize, value: V) -> LeafValue<V> {
        self.version.mark_modified();
        std::mem::replace(&mut self.lv[p], LeafValue::Value(value))
    }

    /// Create an unstable layer-link slot at `perm.back()` ahead of the
    /// nested tree actually being built — `node::leaf`'s two-step
    /// unstable-then-stable transition so a concurrent reader racing the
    /// layer's construction either sees the old suffix-bearing slot or
    /// waits on `stable()` rather than observing a half-built layer.
    pub fn assign_unstable_layer(
        &mut self,
        ikey: u64,
        logical_pos: usize,
        layer_root: NodeId<V>,
    ) -> usize {
        debug_assert!(!self.is_full());
        self.version.mark_inserting();
        let perm = self.permutation();
        let slot = perm.back();
        self.ikey0[slot] = ikey;
        self.keylenx[slot] = keylenx::LAYER_UNSTABLE;
        self.lv[slot] = LeafValue::Child(layer_root);
        self.publish_permutation(perm.insert_from_back(logical_pos));
        slot
    }

    /// Flip slot `p`'s tag to stable once the nested layer's single
    /// leaf has absorbed both colliding keys.
    pub fn stabilize_layer(&mut self, p: usize) {
        debug_assert_eq!(self.keylenx[p], keylenx::LAYER_UNSTABLE);
        self.keylenx[p] = keylenx::LAYER_STABLE;
        self.version.mark_inserting();
    }

    /// Convert an existing value slot in place into an unstable layer
    /// link, keeping its physical slot and logical position (same
    /// ikey, no permutation change) — used when a new key's insert
    /// collides on ikey with this slot's suffix, per
    /// `masstree_tcursor.hh`'s `create_new_layer`. Returns the value
    /// that occupied the slot so the caller can insert it into the
    /// freshly allocated nested leaf.
    pub(crate) fn convert_to_unstable_layer(&mut self, p: usize, layer_root: NodeId<V>) -> V {
        debug_assert!(!self.is_node(p));
        self.version.mark_inserting();
        let old = std::mem::replace(&mut self.lv[p], LeafValue::Child(layer_root));
        self.keylenx[p] = keylenx::LAYER_UNSTABLE;
        match old {
            LeafValue::Value(v) => v,
            _ => unreachable!("slot held a plain value"),
        }
    }

    /// Extract slot `p`'s raw contents (ikey, keylenx tag, suffix bytes,
    /// value) without touching the permutation — used by leaf split,
    /// which rebuilds both leaves' permutations itself once every
    /// migrated slot has been relocated via `put_raw_slot`.
    pub(crate) fn take_raw_slot(&mut self, p: usize) -> (u64, u8, Vec<u8>, LeafValue<V>) {
        let ikey = self.ikey0[p];
        let tag = self.keylenx[p];
        let suffix = if keylenx::has_suffix(tag) {
            self.suffix(p).to_vec()
        } else {
            Vec::new()
        };
        let value = self.lv[p].take();
        (ikey, tag, suffix, value)
    }

    /// Write a previously-extracted slot's contents into this leaf's
    /// next free physical slot (`perm.back()`), without publishing a
    /// permutation change — the caller does that once for the whole
    /// batch (see `cursor::locked`'s split helper).
    pub(crate) fn put_raw_slot(&mut self, ikey: u64, tag: u8, suffix: &[u8], value: LeafValue<V>) -> usize {
        let perm = self.permutation();
        let slot = perm.back();
        self.ikey0[slot] = ikey;
        self.keylenx[slot] = tag;
        if keylenx::has_suffix(tag) {
            self.assign_suffix(slot, suffix);
        }
        self.lv[slot] = value;
        slot
    }

    /// Rotate slot at logical position `i` to the tail, mark it
    /// removed, and bump the node timestamp so a racing insert into the
    /// freed slot is detected (P8).
    ///
    /// `has_prev` upholds I5: physical slot 0 of a non-leftmost leaf is
    /// never allowed into the free tail, since it is the slot readers
    /// trust to carry the leaf's lower bound (I1). If the logical
    /// position being removed happens to live at physical slot 0 and
    /// another live entry remains, that other entry's fields (and its
    /// string-bag suffix) are swapped into slot 0 first, so it is that
    /// *other* entry's old physical slot — never slot 0 — that ends up
    /// free.
    pub fn remove_at(&mut self, logical_pos: usize, has_prev: bool) -> LeafValue<V> {
        self.version.mark_modified();
        let mut perm = self.permutation();
        if has_prev && perm.get(logical_pos) == 0 && perm.size() > 1 {
            // Swap slot 0's data with another live slot's, then swap
            // their names in the permuter to match. The entry being
            // removed (named `logical_pos`) now lives at the physical
            // slot that used to belong to the kept entry, so the final
            // `remove` below still targets `logical_pos` and frees that
            // slot — never slot 0.
            let keep_logical = if logical_pos == 0 { 1 } else { 0 };
            let keep_slot = perm.get(keep_logical);
            self.ikey0.swap(0, keep_slot);
            self.keylenx.swap(0, keep_slot);
            self.lv.swap(0, keep_slot);
            self.suffixes.swap_slots(0, keep_slot);
            if let Some(heap) = &mut self.heap_suffixes {
                heap.swap_slots(0, keep_slot);
            }
            perm = perm.exchange(logical_pos, keep_logical);
        }
        let slot = perm.get(logical_pos);
        let taken = self.lv[slot].take();
        self.publish_permutation(perm.remove(logical_pos));
        self.nremoved = self.nremoved.saturating_add(1);
        self.bump_node_ts();
        taken
    }

    pub fn is_empty_of_values(&self) -> bool {
        self.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_find_round_trips() {
        let mut leaf: Box<Leaf<u64>> = Leaf::new(true);
        let slot = leaf.assign_value(100, 8, &[], 42, 0);
        assert_eq!(leaf.size(), 1);
        let found = leaf.find(100, 8, &[]).unwrap();
        assert_eq!(found, slot);
        assert_eq!(*leaf.value(found).unwrap(), 42);
    }

    #[test]
    fn assign_with_suffix_round_trips() {
        let mut leaf: Box<Leaf<u64>> = Leaf::new(true);
        leaf.assign_value(1, 12, b"tail", 7, 0);
        let found = leaf.find(1, 12, b"tail").unwrap();
        assert_eq!(*leaf.value(found).unwrap(), 7);
        assert!(leaf.find(1, 12, b"different").is_none());
    }

    #[test]
    fn remove_frees_slot_and_bumps_timestamp() {
        let mut leaf: Box<Leaf<u64>> = Leaf::new(true);
        leaf.assign_value(1, 8, &[], 1, 0);
        leaf.assign_value(2, 8, &[], 2, 1);
        let before_ts = leaf.node_ts();
        leaf.remove_at(0, false);
        assert_eq!(leaf.size(), 1);
        assert!(leaf.node_ts() > before_ts);
        assert!(leaf.find(1, 8, &[]).is_none());
        assert!(leaf.find(2, 8, &[]).is_some());
    }

    #[test]
    fn remove_pins_physical_slot_zero_when_has_prev() {
        // Both keys land in physical slots in insertion order: key 1 at
        // slot 0, key 2 at slot 1. Removing the logical position that
        // maps to slot 0 with `has_prev == true` must not free slot 0 —
        // it should swap key 2's data into slot 0 instead, leaving slot 1
        // as the one rotated to the free tail.
        let mut leaf: Box<Leaf<u64>> = Leaf::new(false);
        leaf.assign_value(1, 8, &[], 10, 0);
        leaf.assign_value(2, 8, &[], 20, 1);
        leaf.remove_at(0, true);
        assert_eq!(leaf.size(), 1);
        assert!(leaf.find(1, 8, &[]).is_none());
        let found = leaf.find(2, 8, &[]).expect("key 2 survives");
        assert_eq!(leaf.ikey(found), 2);
        assert_eq!(*leaf.value(found).unwrap(), 20);
        // The survivor's data now lives at physical slot 0.
        assert_eq!(leaf.permutation().get(found), 0);
    }

    #[test]
    fn unstable_layer_then_stabilize() {
        let mut leaf: Box<Leaf<u64>> = Leaf::new(true);
        let child_ptr = Box::into_raw(Leaf::<u64>::new(false));
        let child_id = NodeId::from_leaf(child_ptr);
        let slot = leaf.assign_unstable_layer(5, 0, child_id);
        assert!(leaf.is_node(slot));
        assert!(!leaf.is_stable_node(slot));
        leaf.stabilize_layer(slot);
        assert!(leaf.is_stable_node(slot));
        super::super::free_unpublished_leaf(child_id);
    }
}
