// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Locked insert/remove cursor.
//!
//! Ported from `original_source/masstree_tcursor.hh`'s `tcursor::find_insert`
//! and `tcursor::find_remove`: reach the responsible leaf with the
//! lock-free descent (`cursor::reach`), then couple locks along the
//! B-link `next` chain so a concurrent split never loses the key. The
//! three writer-side cases `find_insert` distinguishes — exact-key
//! replace, ikey collision needing a new layer, and plain insert with a
//! possible split — are modeled as the three branches of `insert_rec`.
//!
//! Every lock acquired here is a `NodeGuard` (see `node::mod`), so a
//! panic on an internal invariant (an `expect()` firing) still unlocks
//! on unwind instead of wedging the node for every future caller.

use super::reach::reach_leaf;
use crate::epoch::ThreadContext;
use crate::key::Key;
use crate::node::{LeafValue, NodeGuard, NodeId, WIDTH};
use crate::permuter::Permuter;

/// Insert or overwrite `key` with `value`, returning the layer-0 root
/// to cache (it only ever changes by growing a new top-level root) and
/// the value previously stored there, if any.
pub fn put_or_update<V: Clone>(
    root: NodeId<V>,
    key: &Key,
    value: V,
    ctx: &mut ThreadContext<V>,
) -> (NodeId<V>, Option<V>) {
    insert_rec(root, key.clone(), value, ctx)
}

/// Remove `key`, returning the layer-0 root to cache and the value that
/// was stored there, if any.
pub fn remove<V: Clone>(
    root: NodeId<V>,
    key: &Key,
    ctx: &mut ThreadContext<V>,
) -> (NodeId<V>, Option<V>) {
    let (root, value, _top_layer_emptied) = remove_rec(root, key.clone(), true, ctx);
    (root, value)
}

/// Lock-couple from `root` to the leaf presently responsible for
/// `ikey`: descend lock-free (`reach_leaf`), lock the landing leaf,
/// then follow `next` (locking ahead before releasing behind) while a
/// concurrent split has moved responsibility forward.
fn lock_responsible_leaf<V>(root: NodeId<V>, ikey: u64) -> NodeGuard<V> {
    let (leaf, _snapshot) = reach_leaf(root, ikey);
    let mut guard = leaf.lock();
    loop {
        let next = {
            let l = unsafe { guard.id().as_leaf() };
            match l.next() {
                Some(next) => {
                    let next_leaf = unsafe { next.as_leaf() };
                    if next_leaf.size() > 0 && ikey >= next_leaf.ikey_bound() {
                        Some(next)
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        match next {
            Some(next) => guard = next.lock(),
            None => return guard,
        }
    }
}

/// Logical position `ikey` would occupy among this leaf's live slots,
/// without regard to suffix — callers additionally check `l.ikey(..)`
/// at that position to detect an exact ikey tie.
fn logical_lower_bound<V>(l: &crate::node::Leaf<V>, perm: &Permuter, ikey: u64) -> usize {
    let mut lo = 0usize;
    let mut hi = perm.size();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if l.ikey(perm.get(mid)) < ikey {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

fn insert_rec<V: Clone>(
    root: NodeId<V>,
    mut key: Key,
    mut value: V,
    ctx: &mut ThreadContext<V>,
) -> (NodeId<V>, Option<V>) {
    let mut root = root;
    loop {
        let layer_root = root.unsplit_ancestor();
        let guard = lock_responsible_leaf(layer_root, key.ikey());
        let leaf_id = guard.id();
        let found = unsafe { leaf_id.as_leaf() }.find(key.ikey(), key.ikeylen(), key.suffix());

        if let Some(slot) = found {
            let l = unsafe { leaf_id.as_leaf_mut() };
            if l.is_node(slot) {
                if !l.is_stable_node(slot) {
                    while !unsafe { leaf_id.as_leaf() }.is_stable_node(slot) {
                        std::hint::spin_loop();
                    }
                }
                let child_root = unsafe { leaf_id.as_leaf() }
                    .child(slot)
                    .expect("node slot has a child");
                drop(guard);
                root = child_root;
                key = key.shift();
                continue;
            }
            let prev = l.replace_value(slot, value);
            drop(guard);
            let prev_value = match prev {
                LeafValue::Value(v) => Some(v),
                _ => None,
            };
            return (layer_root, prev_value);
        }

        // No exact match. Check whether another slot nonetheless shares
        // this ikey (a different-length or different-suffix key) —
        // that is a collision requiring a new nested layer rather than
        // a plain insert.
        let l = unsafe { leaf_id.as_leaf_mut() };
        let perm = l.permutation();
        let pos = logical_lower_bound(l, &perm, key.ikey());
        let collision_slot =
            (pos < perm.size() && l.ikey(perm.get(pos)) == key.ikey()).then(|| perm.get(pos));

        if let Some(slot) = collision_slot {
            let old_suffix = if l.has_suffix(slot) {
                l.suffix(slot).to_vec()
            } else {
                Vec::new()
            };
            let new_layer_id = ctx.alloc_leaf(true);
            let old_value = l.convert_to_unstable_layer(slot, new_layer_id);
            drop(guard);

            let old_key = Key::new(&old_suffix);
            let new_key = key.shift();
            insert_rec(new_layer_id, old_key, old_value, ctx);
            let (_, displaced) = insert_rec(new_layer_id, new_key, value, ctx);

            // Re-locate the slot by ikey (not the old index) before
            // stabilizing: it is the same ikey value either way, but a
            // concurrent split may have moved it to a sibling leaf or a
            // different physical slot in the meantime.
            let guard2 = lock_responsible_leaf(layer_root, key.ikey());
            let leaf_id2 = guard2.id();
            let l2 = unsafe { leaf_id2.as_leaf_mut() };
            let perm2 = l2.permutation();
            let pos2 = logical_lower_bound(l2, &perm2, key.ikey());
            let slot2 = perm2.get(pos2);
            l2.stabilize_layer(slot2);
            drop(guard2);
            return (layer_root, displaced);
        }

        if unsafe { leaf_id.as_leaf() }.is_full() {
            drop(guard);
            split_leaf_and_cascade(leaf_id, ctx);
            continue;
        }

        l.assign_value(key.ikey(), key.ikeylen(), key.suffix(), value, pos);
        drop(guard);
        return (layer_root, None);
    }
}

/// Split a full leaf in half and cascade the new separator up through
/// parent internodes (possibly creating a new root), per
/// `masstree_tcursor.hh`'s `finish_split`. The caller retries its own
/// descent from the top afterward since the key it was inserting may
/// now belong to either half.
fn split_leaf_and_cascade<V>(leaf_id: NodeId<V>, ctx: &mut ThreadContext<V>) {
    let guard = leaf_id.lock();
    if !unsafe { leaf_id.as_leaf() }.is_full() {
        // Another writer already split this leaf while we re-acquired
        // the lock; nothing to do.
        return;
    }
    leaf_id.version().mark_splitting();

    let was_root = leaf_id.version().unstable().is_root();
    let new_right_id = ctx.alloc_leaf(false);
    let up_ikey = {
        let l = unsafe { leaf_id.as_leaf_mut() };
        let new_leaf = unsafe { new_right_id.as_leaf_mut() };
        let perm = l.permutation();
        let n = perm.size();
        debug_assert_eq!(n, WIDTH);
        let mid = n / 2;

        let mut new_perm = Permuter::empty();
        for logical in mid..n {
            let old_slot = perm.get(logical);
            let (ikey, tag, suffix, lv) = l.take_raw_slot(old_slot);
            if let LeafValue::Child(child) = &lv {
                child.set_parent(new_right_id);
            }
            new_leaf.put_raw_slot(ikey, tag, &suffix, lv);
            new_perm = new_perm.insert_from_back(new_perm.size());
        }
        new_leaf.publish_permutation(new_perm);
        l.shrink_permutation_to(mid);

        new_leaf.set_next(l.next());
        if let Some(old_next) = l.next() {
            unsafe { old_next.as_leaf() }.set_prev(Some(new_right_id));
        }
        l.set_next(Some(new_right_id));
        new_leaf.set_prev(Some(leaf_id));
        // `new_right_id`'s parent is set by whichever branch below
        // actually links it in: a fresh root (both halves set
        // explicitly) or the cascade into the existing parent
        // (`Internode::assign`/`Internode::split` both set it).

        unsafe { new_right_id.as_leaf() }.ikey_bound()
    };

    if was_root {
        let new_root = ctx.alloc_internode(true);
        {
            let nr = unsafe { new_root.as_internode_mut() };
            nr.assign_initial(up_ikey, leaf_id, new_right_id);
        }
        leaf_id.version().clear_root();
        leaf_id.set_parent(new_root);
        new_right_id.set_parent(new_root);
        return;
    }

    let parent = leaf_id.parent().expect("non-root leaf has a parent");
    drop(guard);
    insert_separator_into_parent(parent, up_ikey, new_right_id, ctx);
}

/// Cascade a freshly split child's separator into its parent internode,
/// splitting (and, if necessary, re-rooting) as many ancestor levels as
/// needed. Internodes in this port carry no `next` pointer (only leaves
/// are linked for lock-free B^link traversal — `reach_leaf` only ever
/// needs a stable snapshot of an internode's own bounded array, never a
/// sideways step), so locking straight down from each level's `parent()`
/// is sufficient; there is no sibling chain to lock-couple through.
fn insert_separator_into_parent<V>(
    parent: NodeId<V>,
    sep_ikey: u64,
    right: NodeId<V>,
    ctx: &mut ThreadContext<V>,
) {
    let mut parent = parent;
    let mut sep_ikey = sep_ikey;
    let mut right = right;
    loop {
        let guard = parent.lock();

        let p = unsafe { parent.as_internode() };
        if !p.is_full() {
            let insert_pos = p.upper_bound(sep_ikey);
            unsafe { parent.as_internode_mut() }.assign(insert_pos, sep_ikey, right, parent);
            return;
        }

        let insert_pos = p.upper_bound(sep_ikey);
        let was_root = parent.version().unstable().is_root();
        let new_right_id = ctx.alloc_internode(false);
        let up_ikey = {
            let left_internode = unsafe { parent.as_internode_mut() };
            let right_internode = unsafe { new_right_id.as_internode_mut() };
            left_internode.split(insert_pos, sep_ikey, right, right_internode, new_right_id, parent)
        };

        if was_root {
            let new_root = ctx.alloc_internode(true);
            {
                let nr = unsafe { new_root.as_internode_mut() };
                nr.assign_initial(up_ikey, parent, new_right_id);
            }
            parent.version().clear_root();
            parent.set_parent(new_root);
            new_right_id.set_parent(new_root);
            return;
        }

        let grandparent = parent.parent().expect("non-root internode has a parent");
        drop(guard);
        sep_ikey = up_ikey;
        right = new_right_id;
        parent = grandparent;
    }
}

/// Remove `key` starting from `root`. Returns the layer's root to cache,
/// the value that was removed (if any), and whether this call left the
/// layer rooted at the returned id entirely empty — the caller, which
/// alone knows the parent leaf and slot that link into this layer, uses
/// that signal to collapse the slot via `collapse_layer_slot`.
fn remove_rec<V: Clone>(
    root: NodeId<V>,
    key: Key,
    is_top_layer: bool,
    ctx: &mut ThreadContext<V>,
) -> (NodeId<V>, Option<V>, bool) {
    let layer_root = root.unsplit_ancestor();
    let guard = lock_responsible_leaf(layer_root, key.ikey());
    let leaf_id = guard.id();
    let found = unsafe { leaf_id.as_leaf() }.find(key.ikey(), key.ikeylen(), key.suffix());

    let slot = match found {
        None => return (layer_root, None, false),
        Some(slot) => slot,
    };

    let l = unsafe { leaf_id.as_leaf_mut() };
    if l.is_node(slot) {
        if !l.is_stable_node(slot) {
            while !unsafe { leaf_id.as_leaf() }.is_stable_node(slot) {
                std::hint::spin_loop();
            }
        }
        let child_root = unsafe { leaf_id.as_leaf() }
            .child(slot)
            .expect("node slot has a child");
        let this_ikey = key.ikey();
        drop(guard);
        let (collapsed_root, value, child_emptied) =
            remove_rec(child_root, key.shift(), false, ctx);
        if child_emptied {
            collapse_layer_slot(layer_root, this_ikey, collapsed_root, ctx);
        }
        return (layer_root, value, false);
    }

    let has_prev = l.prev().is_some();
    let logical_pos = l
        .permutation()
        .iter()
        .position(|s| s == slot)
        .expect("slot is live");
    let taken = l.remove_at(logical_pos, has_prev);
    let value = match taken {
        LeafValue::Value(v) => Some(v),
        _ => None,
    };
    // A nested layer's sole leaf emptying out means the whole layer is
    // now dead weight on its parent's slot; signal that up one level so
    // the parent (the only frame that holds the leaf+slot pointing into
    // this layer) can actually collapse and retire it.
    let emptied = !is_top_layer && l.size() == 0 && l.prev().is_none() && l.next().is_none();
    if emptied {
        l.mark_deleted_layer();
        leaf_id.version().mark_deleted();
    }
    drop(guard);
    (layer_root, value, emptied)
}

/// Having learned that the layer rooted at `child_root` emptied out,
/// re-lock the parent leaf responsible for `ikey` in the outer layer
/// and, if its layer-link slot still points at that same (still empty)
/// child, excise the slot and retire the child.
///
/// Re-validates everything under lock rather than trusting the caller's
/// stale observation: another thread may have repopulated the layer (a
/// concurrent insert recreating it under the same ikey) between the
/// bottom frame noticing emptiness and this collapse running. Locks
/// parent-then-child, the same top-down order every other cross-layer
/// path in this cursor already uses, so this introduces no new deadlock.
fn collapse_layer_slot<V>(
    layer_root: NodeId<V>,
    ikey: u64,
    child_root: NodeId<V>,
    ctx: &mut ThreadContext<V>,
) {
    let guard = lock_responsible_leaf(layer_root, ikey);
    let leaf_id = guard.id();
    let l = unsafe { leaf_id.as_leaf_mut() };

    let slot = match l.find(ikey, 0, &[]) {
        Some(slot) if l.is_node(slot) => slot,
        _ => return,
    };
    if !l.is_stable_node(slot) {
        while !unsafe { leaf_id.as_leaf() }.is_stable_node(slot) {
            std::hint::spin_loop();
        }
    }
    if l.child(slot) != Some(child_root) {
        // Already collapsed by another racing remover, or repopulated
        // under a different child id.
        return;
    }

    let child_guard = child_root.lock();
    let still_empty = {
        let child = unsafe { child_root.as_leaf() };
        child.size() == 0 && child.prev().is_none() && child.next().is_none()
    };
    if !still_empty {
        return;
    }

    let has_prev = l.prev().is_some();
    let logical_pos = l
        .permutation()
        .iter()
        .position(|s| s == slot)
        .expect("slot is live");
    l.remove_at(logical_pos, has_prev);
    child_root.version().mark_deleted();
    drop(child_guard);
    ctx.retire(child_root);
}
