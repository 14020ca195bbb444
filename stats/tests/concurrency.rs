//! Multi-threaded stress tests for the symbol table and allocators.

use std::sync::Arc;
use std::thread;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use stats::{
    BlockOptions, BlockStatDataAllocator, HeapStatDataAllocator, StatDataAllocator,
    StatNameStorage, StatsOptions, Store, SymbolTable,
};

const TOKENS: &[&str] = &[
    "cluster", "listener", "http", "tcp", "upstream", "downstream", "rq", "cx", "2xx", "4xx",
    "5xx", "total", "active", "retry", "timeout", "local",
];

fn random_name(rng: &mut Xoshiro256PlusPlus) -> String {
    let depth = rng.gen_range(1..=4);
    let mut name = String::new();
    for i in 0..depth {
        if i > 0 {
            name.push('.');
        }
        name.push_str(TOKENS[rng.gen_range(0..TOKENS.len())]);
    }
    name
}

#[test]
fn test_randomized_encode_free_drains_table() {
    const THREADS: u64 = 8;
    const ITERS: usize = 4000;

    let table = Arc::new(SymbolTable::new());
    let mut handles = Vec::new();
    for id in 0..THREADS {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5eed_0000 + id);
            let mut live: Vec<StatNameStorage> = Vec::new();
            for _ in 0..ITERS {
                if live.is_empty() || rng.gen_bool(0.6) {
                    live.push(StatNameStorage::new(&random_name(&mut rng), &table));
                } else {
                    let index = rng.gen_range(0..live.len());
                    let mut storage = live.swap_remove(index);
                    storage.release(&table);
                }
            }
            for mut storage in live {
                storage.release(&table);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Every reference was balanced, so the table must be fully drained.
    assert_eq!(table.num_symbols(), 0);
}

#[test]
fn test_concurrent_decodes_see_consistent_names() {
    const THREADS: u64 = 4;
    let table = Arc::new(SymbolTable::new());

    let mut handles = Vec::new();
    for id in 0..THREADS {
        let table = Arc::clone(&table);
        handles.push(thread::spawn(move || {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xdec0de + id);
            for _ in 0..2000 {
                let name = random_name(&mut rng);
                let mut storage = StatNameStorage::new(&name, &table);
                // Another thread may be churning the table, but our own
                // references pin our tokens.
                assert_eq!(table.decode(storage.stat_name()), name);
                storage.release(&table);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(table.num_symbols(), 0);
}

#[test]
fn test_concurrent_counter_increments() {
    const THREADS: usize = 4;
    const INCS: u64 = 10_000;

    let store = Arc::new(Store::new(
        Arc::new(SymbolTable::new()),
        Arc::new(HeapStatDataAllocator::new(StatsOptions::default())),
    ));

    let mut handles = Vec::new();
    for id in 0..THREADS {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let shared = store.counter("worker.shared.ops").unwrap();
            let own = store.counter(&format!("worker.{id}.ops")).unwrap();
            for _ in 0..INCS {
                shared.inc();
                own.inc();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let shared = store.counter("worker.shared.ops").unwrap();
    assert_eq!(shared.value(), THREADS as u64 * INCS);
    assert_eq!(shared.latch(), THREADS as u64 * INCS);
    for id in 0..THREADS {
        assert_eq!(store.counter(&format!("worker.{id}.ops")).unwrap().value(), INCS);
    }
}

#[test]
fn test_concurrent_block_alloc_free() {
    const THREADS: u64 = 4;

    let allocator = Arc::new(
        BlockStatDataAllocator::new(
            &BlockOptions {
                capacity: 64,
                num_slots: 67,
            },
            &StatsOptions::default(),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for id in 0..THREADS {
        let allocator = Arc::clone(&allocator);
        handles.push(thread::spawn(move || {
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xb10c + id);
            for _ in 0..2000 {
                // A small shared namespace maximizes cross-thread
                // contention on individual records.
                let name = format!("shared.{}", rng.gen_range(0..16));
                if let Some(data) = allocator.alloc(&name) {
                    // SAFETY: we hold a reference until the free below.
                    unsafe { data.get() }.add_value(1);
                    allocator.free(data);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // All references were balanced, so every cell is vacant again.
    assert_eq!(allocator.size(), 0);
}
