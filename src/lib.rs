// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! LatticeKV - an embeddable, concurrent ordered key-value store.
//!
//! A trie of B+-trees over 8-byte windows of the key (ported from
//! Masstree): point lookups and range scans never block behind a
//! writer, and writers couple locks hand-over-hand along the B-link
//! chain rather than locking whole subtrees.
//!
//! ## Quick Start
//!
//! ```rust
//! use latticekv::Table;
//!
//! let table: Table<u64> = Table::new();
//! let mut ctx = table.context();
//! table.put_or_update(&mut ctx, b"answer", 42);
//! assert_eq!(table.get(&ctx, b"answer"), Some(42));
//! ```
//!
//! ## Architecture
//!
//! - **key**: the 8-byte-window view of a key, layer by layer
//! - **version**: the per-node optimistic-concurrency version word
//! - **permuter**: a leaf's logical slot ordering
//! - **stringbag**: inline + heap-overflow suffix storage
//! - **node**: leaf and internode storage, the tagged `NodeId` handle
//! - **cursor**: lock-free reads (`unlocked`), the descent protocol
//!   (`reach`), and the locked insert/remove cursor (`locked`)
//! - **scan**: ordered forward/reverse range scan
//! - **epoch**: quiescent-state reclamation
//! - **table**: the public embedded-library facade
//! - **error**, **config**, **metrics**: the ambient stack

pub mod config;
pub mod cursor;
pub mod epoch;
pub mod error;
pub mod key;
pub mod metrics;
pub mod node;
pub mod permuter;
pub mod scan;
pub mod stringbag;
pub mod table;
pub mod version;

pub use config::EngineConfig;
pub use error::{LatticeError, LatticeResult};
pub use metrics::{Metric, MetricType, MetricUnit, MetricsCollector};
pub use table::Table;
