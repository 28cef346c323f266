// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Operation counters and latency aggregation, in-process only.
//!
//! - **types**: `Metric`, `MetricType`, `MetricUnit`
//! - **collector**: `MetricsCollector` global singleton
//! - **aggregator**: percentile and statistical calculations
//!
//! No CSV storage backend (see DESIGN.md for why it was dropped): this
//! crate is an embedded library with no on-disk state of its own, so
//! `MetricsCollector::flush` moves buffered metrics into a capped
//! in-memory ring per metric name rather than writing files, and
//! `stats_for` aggregates that ring on demand.
//!
//! ## Quick Start
//!
//! ```rust
//! use latticekv::metrics::{MetricsCollector, Metric, MetricUnit};
//!
//! let metric = Metric::new("get_latency", 12.0, MetricUnit::Microseconds)
//!     .with_tag("op", "get");
//!
//! MetricsCollector::global().record(metric);
//! MetricsCollector::global().flush();
//! ```

pub mod aggregator;
pub mod collector;
pub mod types;

#[cfg(test)]
mod aggregator_test;
#[cfg(test)]
mod mod_test;
#[cfg(test)]
mod types_test;

// Re-export commonly used types for convenience
pub use aggregator::{calculate_stats, p50, p95, p99, MetricStats};
pub use collector::MetricsCollector;
pub use types::{Metric, MetricType, MetricUnit};
