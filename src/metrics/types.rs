// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Core metric types.
//!
//! - `Metric`: a single measurement with tags
//! - `MetricType`: classification of metric behaviour
//! - `MetricUnit`: unit of measurement with display formatting

use std::collections::HashMap;

/// A single metric measurement.
///
/// ## Example
/// ```
/// use latticekv::metrics::types::{Metric, MetricUnit};
///
/// let metric = Metric::new("get_latency", 1250.0, MetricUnit::Microseconds)
///     .with_tag("op", "get");
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name (e.g., "get_latency", "split_count")
    pub name: String,

    /// Numeric value of the measurement
    pub value: f64,

    /// Unit of measurement
    pub unit: MetricUnit,

    /// Optional tags for filtering/aggregation
    pub tags: HashMap<String, String>,

    /// Unix timestamp in nanoseconds (when the metric was recorded)
    pub timestamp: u64,
}

impl Metric {
    /// Creates a new metric with the current timestamp.
    pub fn new(name: impl Into<String>, value: f64, unit: MetricUnit) -> Self {
        Self {
            name: name.into(),
            value,
            unit,
            tags: HashMap::new(),
            timestamp: Self::now_nanos(),
        }
    }

    /// Adds a tag to the metric (builder pattern).
    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Adds multiple tags at once.
    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags.extend(tags);
        self
    }

    fn now_nanos() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before Unix epoch")
            .as_nanos() as u64
    }

    /// Formats the metric value with its unit suffix.
    ///
    /// ## Example
    /// ```
    /// use latticekv::metrics::types::{Metric, MetricUnit};
    ///
    /// let metric = Metric::new("test", 1250.0, MetricUnit::Microseconds);
    /// assert_eq!(metric.format_value(), "1250.00μs");
    /// ```
    pub fn format_value(&self) -> String {
        format!("{:.2}{}", self.value, self.unit.suffix())
    }
}

/// Classification of metric behaviour: how a metric is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Monotonically increasing counter (get/put/remove/scan/split/retry counts)
    Counter,
    /// Point-in-time value that can go up or down
    Gauge,
    /// Distribution of values (latencies)
    Histogram,
    /// Duration measurement (histogram with a time unit)
    Timer,
}

/// Unit of measurement for metric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Bytes,
    Kilobytes,
    Megabytes,
    Count,
    Percent,
}

impl MetricUnit {
    /// Returns the display suffix for the unit.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Nanoseconds => "ns",
            Self::Microseconds => "μs",
            Self::Milliseconds => "ms",
            Self::Seconds => "s",
            Self::Bytes => "B",
            Self::Kilobytes => "KB",
            Self::Megabytes => "MB",
            Self::Count => "",
            Self::Percent => "%",
        }
    }

    /// Converts a value to its base unit (nanoseconds for time, bytes for
    /// size), for aggregating across differently-scaled metrics of the
    /// same kind.
    pub fn to_base_unit(&self, value: f64) -> f64 {
        match self {
            Self::Nanoseconds => value,
            Self::Microseconds => value * 1_000.0,
            Self::Milliseconds => value * 1_000_000.0,
            Self::Seconds => value * 1_000_000_000.0,
            Self::Bytes => value,
            Self::Kilobytes => value * 1_024.0,
            Self::Megabytes => value * 1_048_576.0,
            Self::Count | Self::Percent => value,
        }
    }
}
