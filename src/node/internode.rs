// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Fan-out-15 routing node.
//!
//! Ported from `original_source/masstree_struct.hh`'s `internode<P>`:
//! `nkeys_` separator keys and `nkeys_ + 1` children, the child at
//! index `p + 1` covering keys `> ikey0_[p]`. `upper_bound` is the
//! linear/binary search `masstree_get.hh` performs before descending.

use super::{AtomicLink, NodeId, WIDTH};
use crate::version::NodeVersion;

#[repr(C)]
pub struct Internode<V> {
    pub(crate) version: NodeVersion,
    nkeys: u8,
    ikey0: [u64; WIDTH],
    /// One past `nkeys` live separators. `Vec` rather than a fixed array
    /// because `AtomicLink` isn't `Copy`. Atomic (not plain `Option`)
    /// because `reach_leaf`'s lock-free descent reads a child pointer
    /// while a locked writer may be concurrently rewriting this array
    /// mid-split.
    child: Vec<AtomicLink<V>>,
    parent: AtomicLink<V>,
}

impl<V> Internode<V> {
    pub fn new(is_root: bool) -> Box<Self> {
        let mut child = Vec::with_capacity(WIDTH + 1);
        for _ in 0..=WIDTH {
            child.push(AtomicLink::new(None));
        }
        Box::new(Internode {
            version: NodeVersion::new(is_root),
            nkeys: 0,
            ikey0: [0; WIDTH],
            child,
            parent: AtomicLink::new(None),
        })
    }

    pub fn size(&self) -> usize {
        self.nkeys as usize
    }

    pub fn ikey(&self, p: usize) -> u64 {
        self.ikey0[p]
    }

    pub fn child(&self, p: usize) -> Option<NodeId<V>> {
        self.child[p].load()
    }

    pub fn parent(&self) -> Option<NodeId<V>> {
        self.parent.load()
    }

    pub fn set_parent(&self, parent: NodeId<V>) {
        self.parent.store(Some(parent));
    }

    /// The child index to descend into for `ikey`: the count of
    /// separator keys that are `<= ikey`.
    pub fn upper_bound(&self, ikey: u64) -> usize {
        let mut lo = 0usize;
        let mut hi = self.nkeys as usize;
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.ikey0[mid] <= ikey {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Write separator `ikey` and its right child into slot `p`,
    /// growing `nkeys_` by one. Caller holds the lock and has already
    /// verified room (`size() < WIDTH`).
    pub fn assign(&mut self, p: usize, ikey: u64, child: NodeId<V>, self_id: NodeId<V>) {
        self.version.mark_modified();
        let n = self.nkeys as usize;
        debug_assert!(p <= n && n < WIDTH);
        for i in (p..n).rev() {
            self.ikey0[i + 1] = self.ikey0[i];
            let moved = self.child[i + 1].load();
            self.child[i + 2].store(moved);
        }
        self.ikey0[p] = ikey;
        self.child[p + 1].store(Some(child));
        child.set_parent(self_id);
        self.nkeys = (n + 1) as u8;
    }

    /// Seed the two children either side of the tree's very first
    /// separator (used only when a new root is created).
    pub fn assign_initial(&mut self, ikey: u64, left: NodeId<V>, right: NodeId<V>) {
        debug_assert_eq!(self.nkeys, 0);
        self.ikey0[0] = ikey;
        self.child[0].store(Some(left));
        self.child[1].store(Some(right));
        self.nkeys = 1;
    }

    /// Split this full internode around `insert_pos`, filling in
    /// `right` (caller-provided so allocation always goes through the
    /// epoch pool — see `cursor::locked`) and returning the separator
    /// key promoted to the parent, per `masstree_tcursor.hh`'s
    /// internode-split branch of `finish_split`.
    pub fn split(
        &mut self,
        insert_pos: usize,
        sep_ikey: u64,
        sep_child: NodeId<V>,
        right: &mut Internode<V>,
        right_id: NodeId<V>,
        self_id: NodeId<V>,
    ) -> u64 {
        self.version.mark_modified();
        right.version.mark_modified();
        let n = self.nkeys as usize;
        debug_assert_eq!(n, WIDTH);

        // Build the logical sequence of n+1 separators/children as if
        // the new one were already inserted, then split at the middle.
        let mut ikeys = [0u64; WIDTH + 1];
        let mut children: Vec<Option<NodeId<V>>> = vec![None; WIDTH + 2];
        children[0] = self.child[0].load();
        let mut src = 0usize;
        for dst in 0..=n {
            if dst == insert_pos {
                ikeys[dst] = sep_ikey;
                children[dst + 1] = Some(sep_child);
            } else {
                ikeys[dst] = self.ikey0[src];
                children[dst + 1] = self.child[src + 1].load();
                src += 1;
            }
        }

        let mid = (n + 1) / 2;
        let up_ikey = ikeys[mid];

        // `sep_child` is the only child pointer genuinely new to this
        // operation (every other child already has the correct parent:
        // either unchanged self_id on the left half, or set by the loop
        // below on the right half), so it needs an explicit parent
        // write regardless of which half it lands in.
        sep_child.set_parent(if insert_pos + 1 <= mid { self_id } else { right_id });

        for (i, k) in ikeys[mid + 1..=n].iter().enumerate() {
            right.ikey0[i] = *k;
        }
        for (i, c) in children[mid + 1..=n + 1].iter().enumerate() {
            right.child[i].store(*c);
            if let Some(c) = c {
                c.set_parent(right_id);
            }
        }
        right.nkeys = (n - mid) as u8;

        self.ikey0 = [0; WIDTH];
        for slot in self.child.iter() {
            slot.store(None);
        }
        for (i, k) in ikeys[..mid].iter().enumerate() {
            self.ikey0[i] = *k;
        }
        for (i, c) in children[..=mid].iter().enumerate() {
            self.child[i].store(*c);
        }
        self.nkeys = mid as u8;

        up_ikey
    }

    pub fn is_full(&self) -> bool {
        self.nkeys as usize == WIDTH
    }
}
