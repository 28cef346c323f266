// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Quiescent-state epoch reclamation.
//!
//! Ported from `original_source/kvthread.hh`'s `threadinfo`: each worker
//! owns a `ThreadContext` with a size-classed free-list bank (reused
//! raw memory, one bucket per `ceil(size / 64)` cache lines, up to
//! `EngineConfig::pool_size_class_cap`) and a limbo queue of nodes freed
//! while readers elsewhere might still be looking at them. A node only
//! becomes reclaimable once every registered thread has advanced its
//! epoch past the one in effect when the node was retired.
//!
//! `rcu_start`/`rcu_stop` bracket the duration in which a thread may
//! hold references into the tree (reads and locked-cursor operations
//! both bracket themselves this way); `rcu_quiesce` additionally runs
//! the reclaimer, so a caller doing a batch of operations only pays for
//! the minimum-epoch scan once per batch, not once per call.

use crate::node::{Internode, Leaf, NodeId};
use once_cell::sync::Lazy;
use std::alloc::Layout;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Sentinel meaning "this thread is not currently inside an RCU
/// section" — never a valid epoch value since the global epoch starts
/// at 1 and only increases.
const IDLE: u64 = u64::MAX;

static GLOBAL_EPOCH: AtomicU64 = AtomicU64::new(1);

static REGISTRY: Lazy<Mutex<Vec<Arc<AtomicU64>>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Advance the global epoch by one. Called by the host process on
/// whatever timer it chooses (`EngineConfig::epoch_tick` names the
/// interval the original's own timer thread used); the core takes no
/// position on how that timer is driven, per the "teardown inherited
/// from the hosting process lifecycle" design note.
pub fn tick() {
    GLOBAL_EPOCH.fetch_add(1, Ordering::AcqRel);
}

pub fn current_epoch() -> u64 {
    GLOBAL_EPOCH.load(Ordering::Acquire)
}

fn min_registered_epoch() -> u64 {
    let registry = REGISTRY.lock().unwrap();
    registry
        .iter()
        .map(|slot| slot.load(Ordering::Acquire))
        .filter(|&e| e != IDLE)
        .min()
        .unwrap_or(current_epoch())
}

fn size_class(bytes: usize) -> usize {
    (bytes + 63) / 64
}

enum Reclaimable {
    Leaf(*mut u8),
    Internode(*mut u8),
}

struct LimboEntry {
    epoch: u64,
    class: usize,
    node: Reclaimable,
}

/// Per-worker allocation and reclamation context. Never shared between
/// threads — `Table::context` hands out one per caller.
pub struct ThreadContext<V> {
    pools: Vec<Vec<*mut u8>>,
    size_class_cap: usize,
    limbo: VecDeque<LimboEntry>,
    epoch_slot: Arc<AtomicU64>,
    _marker: std::marker::PhantomData<V>,
}

unsafe impl<V: Send> Send for ThreadContext<V> {}

impl<V> ThreadContext<V> {
    pub fn new(size_class_cap: usize) -> Self {
        let epoch_slot = Arc::new(AtomicU64::new(IDLE));
        REGISTRY.lock().unwrap().push(epoch_slot.clone());
        ThreadContext {
            pools: (0..=size_class_cap).map(|_| Vec::new()).collect(),
            size_class_cap,
            limbo: VecDeque::new(),
            epoch_slot,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn rcu_start(&self) {
        self.epoch_slot.store(current_epoch(), Ordering::Release);
    }

    pub fn rcu_stop(&self) {
        self.epoch_slot.store(IDLE, Ordering::Release);
    }

    /// Leave the RCU section and reclaim whatever limbo entries are now
    /// provably unobserved by any other registered thread.
    pub fn rcu_quiesce(&mut self) {
        self.rcu_stop();
        let safe_epoch = min_registered_epoch();
        while let Some(front) = self.limbo.front() {
            if front.epoch >= safe_epoch {
                break;
            }
            let entry = self.limbo.pop_front().unwrap();
            self.reclaim(entry);
        }
    }

    fn reclaim(&mut self, entry: LimboEntry) {
        match entry.node {
            Reclaimable::Leaf(ptr) => unsafe {
                std::ptr::drop_in_place(ptr as *mut Leaf<V>);
            },
            Reclaimable::Internode(ptr) => unsafe {
                std::ptr::drop_in_place(ptr as *mut Internode<V>);
            },
        }
        let raw = match entry.node {
            Reclaimable::Leaf(p) => p,
            Reclaimable::Internode(p) => p,
        };
        if entry.class <= self.size_class_cap {
            self.pools[entry.class].push(raw);
        } else {
            unsafe {
                std::alloc::dealloc(raw, Layout::from_size_align_unchecked(entry.class * 64, 64));
            }
        }
    }

    fn take_or_allocate(&mut self, class: usize) -> *mut u8 {
        if class <= self.size_class_cap {
            if let Some(ptr) = self.pools[class].pop() {
                return ptr;
            }
        }
        let layout = Layout::from_size_align(class * 64, 64).expect("valid cache-line layout");
        unsafe { std::alloc::alloc(layout) }
    }

    pub fn alloc_leaf(&mut self, is_root: bool) -> NodeId<V> {
        let class = size_class(std::mem::size_of::<Leaf<V>>());
        let raw = self.take_or_allocate(class);
        unsafe {
            std::ptr::write(raw as *mut Leaf<V>, *Leaf::new(is_root));
        }
        NodeId::from_leaf(raw as *mut Leaf<V>)
    }

    pub fn alloc_internode(&mut self, is_root: bool) -> NodeId<V> {
        let class = size_class(std::mem::size_of::<Internode<V>>());
        let raw = self.take_or_allocate(class);
        unsafe {
            std::ptr::write(raw as *mut Internode<V>, *Internode::new(is_root));
        }
        NodeId::from_internode(raw as *mut Internode<V>)
    }

    /// Defer freeing a node until every other thread has quiesced past
    /// the epoch in effect right now.
    pub fn retire(&mut self, id: NodeId<V>) {
        let epoch = current_epoch();
        if id.is_leaf() {
            let ptr = unsafe { id.as_leaf() } as *const Leaf<V> as *mut u8;
            let class = size_class(std::mem::size_of::<Leaf<V>>());
            self.limbo.push_back(LimboEntry {
                epoch,
                class,
                node: Reclaimable::Leaf(ptr),
            });
        } else {
            let ptr = unsafe { id.as_internode() } as *const Internode<V> as *mut u8;
            let class = size_class(std::mem::size_of::<Internode<V>>());
            self.limbo.push_back(LimboEntry {
                epoch,
                class,
                node: Reclaimable::Internode(ptr),
            });
        }
    }
}

impl<V> Drop for ThreadContext<V> {
    fn drop(&mut self) {
        self.epoch_slot.store(IDLE, Ordering::Release);
        while let Some(entry) = self.limbo.pop_front() {
            self.reclaim(entry);
        }
    }
}
