//! Counters, gauges, and the store that hands them out.
//!
//! A [`Store`] pairs a [`SymbolTable`] with a [`StatDataAllocator`]. The
//! registry is keyed by the *encoded* stat name, so the store never
//! retains the elaborated string: readers decode names back through the
//! table on demand.
//!
//! [`Counter`] and [`Gauge`] are cheap shared handles. The record behind
//! a handle stays allocated until the store entry and every outstanding
//! handle are gone.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::Mutex;
use tracing::warn;

use crate::allocator::{StatDataAllocator, StatRef};
use crate::error::StatsError;
use crate::name::{StatName, StatNameStorage};
use crate::raw::RawStatData;
use crate::table::SymbolTable;

/// Shared interior of a metric handle: the record plus the allocator that
/// reclaims it when the last clone is dropped.
struct MetricInner {
    data: StatRef,
    allocator: Arc<dyn StatDataAllocator>,
}

impl MetricInner {
    fn data(&self) -> &RawStatData {
        // SAFETY: the inner holds one allocator reference on the record
        // for its whole life.
        unsafe { self.data.get() }
    }
}

impl Drop for MetricInner {
    fn drop(&mut self) {
        self.allocator.free(self.data);
    }
}

/// A monotonically increasing metric.
///
/// `value` is the all-time total; a separate pending delta accumulates
/// writes since the last [`latch`](Self::latch), for periodic flush
/// loops. Updates are relaxed atomics and never take a lock.
#[derive(Clone)]
pub struct Counter {
    inner: Arc<MetricInner>,
}

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, delta: u64) {
        let data = self.inner.data();
        data.add_value(delta);
        data.add_pending(delta);
        data.mark_used();
    }

    pub fn value(&self) -> u64 {
        self.inner.data().value()
    }

    /// Take and clear the delta accumulated since the last latch.
    pub fn latch(&self) -> u64 {
        self.inner.data().latch_pending()
    }

    /// Whether the counter has ever been written.
    pub fn used(&self) -> bool {
        self.inner.data().used()
    }

    /// The raw (possibly truncated) name stored in the record.
    pub fn name(&self) -> &str {
        // SAFETY: the record is live while the handle exists.
        unsafe { self.inner.data().key() }
    }
}

/// A point-in-time metric.
#[derive(Clone)]
pub struct Gauge {
    inner: Arc<MetricInner>,
}

impl Gauge {
    pub fn set(&self, value: u64) {
        let data = self.inner.data();
        data.store_value(value);
        data.mark_used();
    }

    pub fn add(&self, delta: u64) {
        let data = self.inner.data();
        data.add_value(delta);
        data.mark_used();
    }

    pub fn sub(&self, delta: u64) {
        let data = self.inner.data();
        data.sub_value(delta);
        data.mark_used();
    }

    pub fn value(&self) -> u64 {
        self.inner.data().value()
    }

    /// Whether the gauge has ever been written.
    pub fn used(&self) -> bool {
        self.inner.data().used()
    }

    /// The raw (possibly truncated) name stored in the record.
    pub fn name(&self) -> &str {
        // SAFETY: the record is live while the handle exists.
        unsafe { self.inner.data().key() }
    }
}

enum Metric {
    Counter(Counter),
    Gauge(Gauge),
}

/// Hands out refcounted metric handles by name. Same name, same record.
pub struct Store {
    table: Arc<SymbolTable>,
    allocator: Arc<dyn StatDataAllocator>,
    metrics: Mutex<HashMap<StatNameStorage, Metric, RandomState>>,
}

impl Store {
    pub fn new(table: Arc<SymbolTable>, allocator: Arc<dyn StatDataAllocator>) -> Self {
        Self {
            table,
            allocator,
            metrics: Mutex::new(HashMap::default()),
        }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    /// Acquire the counter named `name`, creating its record on first use.
    pub fn counter(&self, name: &str) -> Result<Counter, StatsError> {
        // Encode before taking the registry lock; the symbol references
        // ride along as the map key if this is a new metric.
        let mut key = StatNameStorage::new(name, &self.table);

        let mut metrics = self.metrics.lock();
        if let Some(metric) = metrics.get(key.stat_name().as_bytes()) {
            let result = match metric {
                Metric::Counter(counter) => Ok(counter.clone()),
                Metric::Gauge(_) => Err(StatsError::KindMismatch(name.to_string())),
            };
            drop(metrics);
            key.release(&self.table);
            return result;
        }

        match self.allocator.alloc(name) {
            Some(data) => {
                let counter = Counter {
                    inner: Arc::new(MetricInner {
                        data,
                        allocator: Arc::clone(&self.allocator),
                    }),
                };
                metrics.insert(key, Metric::Counter(counter.clone()));
                Ok(counter)
            }
            None => {
                drop(metrics);
                key.release(&self.table);
                warn!(name, "dropping stat: allocator exhausted");
                Err(StatsError::AllocatorFull)
            }
        }
    }

    /// Acquire the gauge named `name`, creating its record on first use.
    pub fn gauge(&self, name: &str) -> Result<Gauge, StatsError> {
        let mut key = StatNameStorage::new(name, &self.table);

        let mut metrics = self.metrics.lock();
        if let Some(metric) = metrics.get(key.stat_name().as_bytes()) {
            let result = match metric {
                Metric::Gauge(gauge) => Ok(gauge.clone()),
                Metric::Counter(_) => Err(StatsError::KindMismatch(name.to_string())),
            };
            drop(metrics);
            key.release(&self.table);
            return result;
        }

        match self.allocator.alloc(name) {
            Some(data) => {
                let gauge = Gauge {
                    inner: Arc::new(MetricInner {
                        data,
                        allocator: Arc::clone(&self.allocator),
                    }),
                };
                metrics.insert(key, Metric::Gauge(gauge.clone()));
                Ok(gauge)
            }
            None => {
                drop(metrics);
                key.release(&self.table);
                warn!(name, "dropping stat: allocator exhausted");
                Err(StatsError::AllocatorFull)
            }
        }
    }

    /// Snapshot every counter as `(name, value)`, ordered by stat name.
    pub fn counters(&self) -> Vec<(String, u64)> {
        self.snapshot(|metric| match metric {
            Metric::Counter(counter) => Some(counter.value()),
            Metric::Gauge(_) => None,
        })
    }

    /// Snapshot every gauge as `(name, value)`, ordered by stat name.
    pub fn gauges(&self) -> Vec<(String, u64)> {
        self.snapshot(|metric| match metric {
            Metric::Gauge(gauge) => Some(gauge.value()),
            Metric::Counter(_) => None,
        })
    }

    fn snapshot(&self, mut pick: impl FnMut(&Metric) -> Option<u64>) -> Vec<(String, u64)> {
        // Copy the encoded keys out so decoding and ordering run without
        // the registry lock.
        let mut entries: Vec<(Vec<u8>, u64)> = {
            let metrics = self.metrics.lock();
            metrics
                .iter()
                .filter_map(|(key, metric)| {
                    pick(metric).map(|value| (key.stat_name().as_bytes().to_vec(), value))
                })
                .collect()
        };
        entries.sort_by(|a, b| {
            let a = StatName::new(&a.0);
            let b = StatName::new(&b.0);
            if self.table.less_than(a, b) {
                std::cmp::Ordering::Less
            } else if self.table.less_than(b, a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        entries
            .into_iter()
            .map(|(bytes, value)| (self.table.decode(StatName::new(&bytes)), value))
            .collect()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        let metrics = self.metrics.get_mut();
        for (mut key, metric) in metrics.drain() {
            drop(metric);
            key.release(&self.table);
        }
    }
}
