// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Global metrics collector singleton.
//!
//! `MetricsCollector::global()` gives every caller in the process the
//! same instance. `flush()` does not write to a CSV backend — this
//! crate has no on-disk state (see DESIGN.md for why the storage
//! backend was dropped) — it moves buffered metrics into a capped
//! in-memory ring per metric name, which `stats_for` then aggregates on
//! demand.

use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::aggregator::{calculate_stats, MetricStats};
use super::types::Metric;

/// Per-name ring capacity. Older samples are dropped once a name's ring
/// is full — this sizes the aggregation window, not correctness.
const RING_CAPACITY: usize = 4096;

static METRICS_COLLECTOR: Lazy<Arc<MetricsCollector>> =
    Lazy::new(|| Arc::new(MetricsCollector::new()));

/// Thread-safe metrics collector.
///
/// ## Example
/// ```
/// use latticekv::metrics::collector::MetricsCollector;
/// use latticekv::metrics::types::{Metric, MetricUnit};
///
/// let metric = Metric::new("get_latency", 12.0, MetricUnit::Microseconds);
/// MetricsCollector::global().record(metric);
/// MetricsCollector::global().flush();
/// ```
pub struct MetricsCollector {
    /// In-memory buffer of metrics awaiting flush.
    buffer: RwLock<Vec<Metric>>,

    /// Per-name ring of recent values, populated by `flush`.
    rings: RwLock<HashMap<String, VecDeque<f64>>>,

    /// Maximum buffer size before auto-flush.
    buffer_limit: usize,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            buffer: RwLock::new(Vec::with_capacity(1000)),
            rings: RwLock::new(HashMap::new()),
            buffer_limit: 1000,
        }
    }

    /// Returns the global singleton instance.
    pub fn global() -> Arc<Self> {
        Arc::clone(&METRICS_COLLECTOR)
    }

    /// Records a metric to the buffer. Auto-flushes once the buffer
    /// reaches `buffer_limit`.
    pub fn record(&self, metric: Metric) {
        let mut buffer = self.buffer.write().expect("metrics buffer lock poisoned");
        buffer.push(metric);
        if buffer.len() >= self.buffer_limit {
            drop(buffer);
            self.flush();
        }
    }

    /// Records multiple metrics at once.
    pub fn record_batch(&self, metrics: Vec<Metric>) {
        let mut buffer = self.buffer.write().expect("metrics buffer lock poisoned");
        buffer.extend(metrics);
        if buffer.len() >= self.buffer_limit {
            drop(buffer);
            self.flush();
        }
    }

    /// Moves all buffered metrics into their per-name rings.
    pub fn flush(&self) {
        let metrics = {
            let mut buffer = self.buffer.write().expect("metrics buffer lock poisoned");
            std::mem::replace(&mut *buffer, Vec::with_capacity(self.buffer_limit))
        };
        if metrics.is_empty() {
            return;
        }

        let mut rings = self.rings.write().expect("metrics ring lock poisoned");
        for metric in metrics {
            let ring = rings.entry(metric.name.clone()).or_default();
            ring.push_back(metric.value);
            while ring.len() > RING_CAPACITY {
                ring.pop_front();
            }
        }
    }

    /// Aggregated statistics for a metric name's current ring contents,
    /// or `None` if nothing has been flushed under that name yet.
    pub fn stats_for(&self, name: &str) -> Option<MetricStats> {
        let rings = self.rings.read().expect("metrics ring lock poisoned");
        let ring = rings.get(name)?;
        let values: Vec<f64> = ring.iter().copied().collect();
        calculate_stats(&values)
    }

    /// Current buffer size (unflushed metrics).
    pub fn buffer_size(&self) -> usize {
        self.buffer.read().expect("metrics buffer lock poisoned").len()
    }

    /// Clears the buffer without flushing. Testing only.
    pub fn clear(&self) {
        self.buffer.write().expect("metrics buffer lock poisoned").clear();
    }
}

impl Drop for MetricsCollector {
    fn drop(&mut self) {
        self.flush();
    }
}
