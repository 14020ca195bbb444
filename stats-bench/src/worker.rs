//! Worker thread for the stats stress harness.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

use stats::{StatNameStorage, Store, SymbolTable};

use crate::config::Config;

/// Shared state between the main thread and workers.
pub struct SharedState {
    running: AtomicBool,
    /// Total operations completed across all workers.
    ops: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            ops: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    #[inline]
    pub fn ops(&self) -> u64 {
        self.ops.load(Ordering::Relaxed)
    }
}

/// Run one worker until the main thread flips the stop flag.
///
/// The workload interleaves two traffics: encode/free churn against the
/// symbol table, and counter increments through the store. Every symbol
/// reference the worker takes is balanced before it exits, so the main
/// thread can assert the table drains.
pub fn run_worker(
    id: usize,
    config: &Config,
    table: &Arc<SymbolTable>,
    store: &Arc<Store>,
    shared: &SharedState,
) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42 + id as u64);
    let mut live: Vec<StatNameStorage> = Vec::with_capacity(config.workload.live_limit);
    let mut batch = 0u64;

    while shared.running() {
        let roll = rng.gen_range(0..100);
        if roll < config.workload.counter_ratio {
            let name = random_name(&mut rng, config);
            match store.counter(&name) {
                Ok(counter) => counter.inc(),
                // Block backend may fill up; dropping the stat is the
                // harness policy.
                Err(_) => {}
            }
        } else if !live.is_empty() && (live.len() >= config.workload.live_limit || rng.gen_bool(0.4))
        {
            let index = rng.gen_range(0..live.len());
            let mut storage = live.swap_remove(index);
            storage.release(table);
        } else {
            let name = random_name(&mut rng, config);
            live.push(StatNameStorage::new(&name, table));
        }

        batch += 1;
        if batch == 128 {
            shared.ops.fetch_add(batch, Ordering::Relaxed);
            batch = 0;
        }
    }
    shared.ops.fetch_add(batch, Ordering::Relaxed);

    for mut storage in live {
        storage.release(table);
    }
}

fn random_name(rng: &mut Xoshiro256PlusPlus, config: &Config) -> String {
    let mut name = String::new();
    for position in 0..config.workload.depth {
        if position > 0 {
            name.push('.');
        }
        let token = rng.gen_range(0..config.workload.tokens);
        name.push_str(&format!("t{position}_{token}"));
    }
    name
}
