// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Lock-free root-to-leaf descent and the B^link "advance" handshake.
//!
//! Ported from `original_source/masstree_get.hh`'s `reach_leaf` and the
//! `advance_to_key` loop embedded in both `get` and `tcursor::find_leaf`.
//! Both reads and the locked cursor share this: a reader only ever holds
//! one stable snapshot at a time and never a lock.

use crate::node::NodeId;

/// Descend from `root` to the leaf that would contain `ikey`, retrying
/// internally on any version change. Returns the leaf id and the stable
/// snapshot observed on it — the caller re-validates that snapshot
/// after reading whatever it needed from the leaf.
pub fn reach_leaf<V>(root: NodeId<V>, ikey: u64) -> (NodeId<V>, crate::version::VersionSnapshot) {
    'retry: loop {
        let mut n = root.unsplit_ancestor();
        loop {
            let snapshot = n.version().stable();
            if n.is_leaf() {
                let (leaf, leaf_snapshot) = advance_to_key(n, ikey, snapshot);
                return (leaf, leaf_snapshot);
            }
            let internode = unsafe { n.as_internode() };
            let child_idx = internode.upper_bound(ikey);
            let child = match internode.child(child_idx) {
                Some(c) => c,
                None => continue 'retry,
            };
            if n.version().has_changed(snapshot) {
                continue 'retry;
            }
            n = child;
        }
    }
}

/// Walk a leaf's `next` chain while its bound no longer covers `ikey`,
/// following the B^link protocol: a concurrent split moves the upper
/// half of a leaf's keys to a new right sibling and links it in before
/// the left leaf's version is unlocked, so a reader that observes a
/// stale left leaf simply needs to step right.
pub fn advance_to_key<V>(
    mut leaf: NodeId<V>,
    ikey: u64,
    mut snapshot: crate::version::VersionSnapshot,
) -> (NodeId<V>, crate::version::VersionSnapshot) {
    loop {
        let l = unsafe { leaf.as_leaf() };
        let should_advance = match l.next() {
            Some(next) => {
                let next_leaf = unsafe { next.as_leaf() };
                next_leaf.size() > 0 && ikey >= next_leaf.ikey_bound()
            }
            None => false,
        };
        if should_advance {
            if let Some(next) = l.next() {
                leaf = next;
                snapshot = leaf.version().stable();
                continue;
            }
        }
        return (leaf, snapshot);
    }
}
