// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Lock-free point lookup.
//!
//! Ported from `original_source/masstree_get.hh`'s `get` entry point;
//! implements spec.md's "Unlocked cursor (get)" steps 1-5 exactly.

use super::reach::reach_leaf;
use crate::key::Key;
use crate::node::NodeId;

/// Look up `key` starting from `root`. A value, if returned, was live
/// at some linearization point between the call's entry and return — no
/// lock is ever taken. `V: Clone` because the value must be copied out
/// while the leaf is still known-live; a reference could dangle the
/// instant a concurrent remove's epoch grace period ends.
pub fn get<V: Clone>(root: NodeId<V>, key: &Key) -> Option<V> {
    let mut root = root;
    let mut key = key.clone();
    loop {
        let (mut leaf, mut snapshot) = reach_leaf(root, key.ikey());
        loop {
            let l = unsafe { leaf.as_leaf() };
            let found = l.find(key.ikey(), key.ikeylen(), key.suffix());
            if l.version().has_changed(snapshot) {
                let (new_leaf, new_snapshot) =
                    super::reach::advance_to_key(leaf, key.ikey(), leaf.version().stable());
                leaf = new_leaf;
                snapshot = new_snapshot;
                continue;
            }
            return match found {
                None => None,
                Some(p) => {
                    if l.is_node(p) {
                        if !l.is_stable_node(p) {
                            // Unstable layer link: the nested tree is still
                            // being built. Spin until it stabilizes rather
                            // than risk reading a half-initialized root.
                            while !unsafe { leaf.as_leaf() }.is_stable_node(p) {
                                std::hint::spin_loop();
                            }
                        }
                        root = unsafe { leaf.as_leaf() }.child(p).expect("node slot has a child");
                        key = key.shift();
                        break;
                    }
                    l.value(p).cloned()
                }
            };
        }
    }
}
