// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Embedded library entry point.
//!
//! `original_source/masstree.hh`'s `default_table` wires the pieces
//! (`basic_table`, a `threadinfo` per worker) into one object a host
//! program actually calls. `Table` is the same wiring: a root pointer
//! shared across threads, handed out alongside a fresh `ThreadContext`
//! per caller via `context()`, matching spec.md §6's "embedded library
//! contract" (no network surface, no multi-key transactions).

use crate::config::EngineConfig;
use crate::cursor::{locked, unlocked};
use crate::epoch::ThreadContext;
use crate::key::Key;
use crate::node::{Leaf, NodeId};
use crate::scan::{scan_forward, scan_reverse};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A single-table Masstree instance. `V` must be `Clone`: readers copy
/// a value out under the optimistic-read protocol rather than holding
/// a reference into a node that a concurrent writer may reclaim.
pub struct Table<V> {
    root: AtomicUsize,
    config: EngineConfig,
    _marker: std::marker::PhantomData<V>,
}

unsafe impl<V: Send> Send for Table<V> {}
unsafe impl<V: Send> Sync for Table<V> {}

impl<V> Table<V> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let root: Box<Leaf<V>> = Leaf::new(true);
        let root_id = NodeId::from_leaf(Box::into_raw(root));
        Table {
            root: AtomicUsize::new(root_id.to_raw()),
            config,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One allocation/reclamation context per worker thread. Never
    /// shared — a caller spanning multiple threads calls this once per
    /// thread, exactly like `original_source/kvthread.hh`'s per-thread
    /// `threadinfo`.
    pub fn context(&self) -> ThreadContext<V> {
        ThreadContext::new(self.config.pool_size_class_cap)
    }

    fn root_id(&self) -> NodeId<V> {
        NodeId::from_raw(self.root.load(Ordering::Acquire)).unsplit_ancestor()
    }

    fn publish_root(&self, new_root: NodeId<V>) {
        self.root.store(new_root.to_raw(), Ordering::Release);
    }
}

impl<V: Clone> Table<V> {
    pub fn get(&self, ctx: &ThreadContext<V>, key: &[u8]) -> Option<V> {
        ctx.rcu_start();
        let result = unlocked::get(self.root_id(), &Key::new(key));
        ctx.rcu_stop();
        result
    }

    pub fn put_or_update(&self, ctx: &mut ThreadContext<V>, key: &[u8], value: V) -> Option<V> {
        ctx.rcu_start();
        let (new_root, prev) = locked::put_or_update(self.root_id(), &Key::new(key), value, ctx);
        self.publish_root(new_root);
        ctx.rcu_quiesce();
        prev
    }

    pub fn remove(&self, ctx: &mut ThreadContext<V>, key: &[u8]) -> Option<V> {
        ctx.rcu_start();
        let (new_root, prev) = locked::remove(self.root_id(), &Key::new(key), ctx);
        self.publish_root(new_root);
        ctx.rcu_quiesce();
        prev
    }

    /// `inclusive` governs only whether a key exactly equal to
    /// `lower_bound` is delivered; it has no effect when `lower_bound`
    /// is `None`.
    pub fn scan(
        &self,
        ctx: &ThreadContext<V>,
        lower_bound: Option<&[u8]>,
        inclusive: bool,
        visit: impl FnMut(&[u8], &V) -> ControlFlow<()>,
    ) {
        ctx.rcu_start();
        scan_forward(self.root_id(), lower_bound, inclusive, visit);
        ctx.rcu_stop();
    }

    /// `inclusive` governs only whether a key exactly equal to
    /// `upper_bound` is delivered; it has no effect when `upper_bound`
    /// is `None`.
    pub fn reverse_scan(
        &self,
        ctx: &ThreadContext<V>,
        upper_bound: Option<&[u8]>,
        inclusive: bool,
        visit: impl FnMut(&[u8], &V) -> ControlFlow<()>,
    ) {
        ctx.rcu_start();
        scan_reverse(self.root_id(), upper_bound, inclusive, visit);
        ctx.rcu_stop();
    }
}

impl<V> Default for Table<V> {
    fn default() -> Self {
        Self::new()
    }
}
