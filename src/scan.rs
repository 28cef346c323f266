// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Ordered forward/reverse scan.
//!
//! Ported from `original_source/masstree_scan.hh`'s push-style `scan`/
//! `rscan`. A pull iterator would need to suspend mid-leaf while holding
//! a reference into a node that a concurrent writer can reclaim the
//! instant this thread leaves its epoch — the Design Notes rule this out
//! in favor of a visitor callback that runs entirely within one epoch
//! critical section per leaf, exactly like the original's `scanner`
//! functor.
//!
//! Keys are delivered as full byte strings (layer prefix already
//! unshifted back on), not as the per-layer `Key` view `cursor::*` uses
//! internally.

use crate::cursor::reach::reach_leaf;
use crate::key::{compare_bytes, Key};
use crate::node::{Leaf, NodeId};
use std::cmp::Ordering;
use std::ops::ControlFlow;

/// Visit every key in `[lower_bound, ∞)` (or `(lower_bound, ∞)` when
/// `inclusive` is false) in ascending order, starting from `root`.
/// Stops early if `visit` returns `ControlFlow::Break`. `inclusive` is
/// meaningless when `lower_bound` is `None` and is ignored in that case.
pub fn scan_forward<V: Clone>(
    root: NodeId<V>,
    lower_bound: Option<&[u8]>,
    inclusive: bool,
    mut visit: impl FnMut(&[u8], &V) -> ControlFlow<()>,
) {
    let mut bound = lower_bound.map(|b| b.to_vec());
    let mut inclusive = inclusive;
    loop {
        match scan_forward_layer(root, bound.as_deref(), inclusive, &[], &mut visit) {
            LayerOutcome::Done | LayerOutcome::Stopped => return,
            LayerOutcome::Retry(resume) => {
                // The resumed key was already delivered (or is the point
                // a concurrent writer moved past us); re-entering at it
                // must never redeliver it.
                bound = Some(resume);
                inclusive = false;
            }
        }
    }
}

/// Visit every key in `(-∞, upper_bound]` (or `(-∞, upper_bound)` when
/// `inclusive` is false) in descending order.
pub fn scan_reverse<V: Clone>(
    root: NodeId<V>,
    upper_bound: Option<&[u8]>,
    inclusive: bool,
    mut visit: impl FnMut(&[u8], &V) -> ControlFlow<()>,
) {
    let mut bound = upper_bound.map(|b| b.to_vec());
    let mut inclusive = inclusive;
    loop {
        match scan_reverse_layer(root, bound.as_deref(), inclusive, &[], &mut visit) {
            LayerOutcome::Done | LayerOutcome::Stopped => return,
            LayerOutcome::Retry(resume) => {
                bound = Some(resume);
                inclusive = false;
            }
        }
    }
}

enum LayerOutcome {
    Done,
    Stopped,
    /// A version change was observed mid-leaf; restart the whole scan
    /// from just past this full key (exclusive), the coarsest retry
    /// granularity that still guarantees forward progress regardless of
    /// what the concurrent writer did structurally.
    Retry(Vec<u8>),
}

fn full_key<V>(l: &Leaf<V>, slot: usize, prefix: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + 16);
    out.extend_from_slice(prefix);
    let ikeylen = l.full_ikeylen(slot);
    out.extend_from_slice(&l.ikey(slot).to_be_bytes()[..ikeylen as usize]);
    if l.has_suffix(slot) {
        out.extend_from_slice(l.suffix(slot));
    }
    out
}

fn scan_forward_layer<V: Clone>(
    root: NodeId<V>,
    lower_bound: Option<&[u8]>,
    inclusive: bool,
    prefix: &[u8],
    visit: &mut impl FnMut(&[u8], &V) -> ControlFlow<()>,
) -> LayerOutcome {
    let start_ikey = Key::new(lower_bound.unwrap_or(&[])).ikey();
    let (mut leaf, mut snapshot) = reach_leaf(root, start_ikey);
    loop {
        let l = unsafe { leaf.as_leaf() };
        let perm = l.permutation();
        for logical in 0..perm.size() {
            let slot = perm.get(logical);
            let key = full_key(l, slot, prefix);
            if let Some(lb) = lower_bound {
                match compare_bytes(&key, lb) {
                    Ordering::Less => continue,
                    Ordering::Equal if !inclusive => continue,
                    _ => {}
                }
            }
            if l.is_node(slot) {
                if !l.is_stable_node(slot) {
                    while !unsafe { leaf.as_leaf() }.is_stable_node(slot) {
                        std::hint::spin_loop();
                    }
                }
                let child = unsafe { leaf.as_leaf() }
                    .child(slot)
                    .expect("node slot has a child");
                // A resumed scan may land back on the same layer-link
                // slot; pass the remaining bound down so the nested
                // layer skips what was already visited.
                let sub_bound = lower_bound.and_then(|lb| {
                    (lb.len() > key.len() && lb.starts_with(&key[..])).then(|| &lb[key.len()..])
                });
                match scan_forward_layer(child, sub_bound, inclusive, &key, visit) {
                    LayerOutcome::Done => continue,
                    other => return other,
                }
            }
            let Some(value) = l.value(slot) else {
                continue;
            };
            if visit(&key, value).is_break() {
                return LayerOutcome::Stopped;
            }
        }
        if l.version().has_changed(snapshot) {
            // Something moved under us; the caller restarts from the
            // last key that was successfully delivered (or the original
            // bound, if nothing was delivered in this leaf yet).
            let last = perm
                .iter()
                .last()
                .map(|slot| full_key(l, slot, prefix))
                .or_else(|| lower_bound.map(|b| b.to_vec()))
                .unwrap_or_default();
            return LayerOutcome::Retry(last);
        }
        match l.next() {
            Some(next) if l.size() > 0 => {
                leaf = next;
                snapshot = leaf.version().stable();
            }
            _ => return LayerOutcome::Done,
        }
    }
}

fn scan_reverse_layer<V: Clone>(
    root: NodeId<V>,
    upper_bound: Option<&[u8]>,
    inclusive: bool,
    prefix: &[u8],
    visit: &mut impl FnMut(&[u8], &V) -> ControlFlow<()>,
) -> LayerOutcome {
    // Descend to the rightmost leaf reachable from `root`, then walk
    // `prev` leftward. There is no reverse sibling chain lighter than
    // this descend-then-walk-back shape in a B^link tree whose only
    // cross-links are `next`/`prev` on leaves.
    let far_right_ikey = u64::MAX;
    let (mut leaf, mut snapshot) = reach_leaf(root, far_right_ikey);
    loop {
        let l = unsafe { leaf.as_leaf() };
        let perm = l.permutation();
        for logical in (0..perm.size()).rev() {
            let slot = perm.get(logical);
            let key = full_key(l, slot, prefix);
            if let Some(ub) = upper_bound {
                match compare_bytes(&key, ub) {
                    Ordering::Greater => continue,
                    Ordering::Equal if !inclusive => continue,
                    _ => {}
                }
            }
            if l.is_node(slot) {
                if !l.is_stable_node(slot) {
                    while !unsafe { leaf.as_leaf() }.is_stable_node(slot) {
                        std::hint::spin_loop();
                    }
                }
                let child = unsafe { leaf.as_leaf() }
                    .child(slot)
                    .expect("node slot has a child");
                let sub_bound = upper_bound.and_then(|ub| {
                    (ub.len() > key.len() && ub.starts_with(&key[..])).then(|| &ub[key.len()..])
                });
                match scan_reverse_layer(child, sub_bound, inclusive, &key, visit) {
                    LayerOutcome::Done => continue,
                    other => return other,
                }
            }
            let Some(value) = l.value(slot) else {
                continue;
            };
            if visit(&key, value).is_break() {
                return LayerOutcome::Stopped;
            }
        }
        if l.version().has_changed(snapshot) {
            let last = perm
                .iter()
                .next()
                .map(|slot| full_key(l, slot, prefix))
                .or_else(|| upper_bound.map(|b| b.to_vec()))
                .unwrap_or_default();
            return LayerOutcome::Retry(last);
        }
        match l.prev() {
            Some(prev) => {
                leaf = prev;
                snapshot = leaf.version().stable();
            }
            None => return LayerOutcome::Done,
        }
    }
}
