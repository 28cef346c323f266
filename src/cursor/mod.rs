// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Tree traversal and mutation cursors.
//!
//! Split across three files, matching `original_source/masstree_tcursor.hh`'s
//! own separation of concerns:
//!
//! - [`reach`] — the lock-free root-to-leaf descent and the B^link
//!   "advance past this leaf" handshake, shared by every operation.
//! - [`unlocked`] — `get`, which only ever calls into `reach`.
//! - [`locked`] — insert/replace/remove, which additionally locks a
//!   leaf, splits it or creates a nested layer, and cascades a split up
//!   through ancestor internodes.

pub mod locked;
pub mod reach;
pub mod unlocked;
