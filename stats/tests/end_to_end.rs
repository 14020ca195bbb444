//! End-to-end flows across the table, names, and both allocator variants.

use std::sync::Arc;

use stats::{
    BlockOptions, BlockStatDataAllocator, HeapStatDataAllocator, StatNameJoiner,
    StatNameTempStorage, StatsOptions, Store, SymbolTable,
};

#[test]
fn test_scoped_names_via_joiner() {
    let table = SymbolTable::new();
    let scope = StatNameTempStorage::new("cluster.outbound", &table);
    let suffix = StatNameTempStorage::new("upstream_rq_2xx", &table);

    // Joining needs no table access; the joined view decodes to the
    // dotted concatenation.
    let joined = StatNameJoiner::new(scope.stat_name(), suffix.stat_name());
    assert_eq!(
        table.decode(joined.stat_name()),
        "cluster.outbound.upstream_rq_2xx"
    );

    // The joined payload is exactly the concatenated payloads.
    let mut expected = scope.stat_name().data().to_vec();
    expected.extend_from_slice(suffix.stat_name().data());
    assert_eq!(joined.stat_name().data(), expected.as_slice());
}

#[test]
fn test_store_over_heap_allocator() {
    let table = Arc::new(SymbolTable::new());
    let store = Store::new(
        Arc::clone(&table),
        Arc::new(HeapStatDataAllocator::new(StatsOptions::default())),
    );

    for name in ["c.one", "c.two", "a.three"] {
        store.counter(name).unwrap().inc();
    }
    store.gauge("g.live").unwrap().set(5);

    let counters = store.counters();
    let names: Vec<&str> = counters.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["a.three", "c.one", "c.two"]);
    assert!(counters.iter().all(|&(_, v)| v == 1));

    // Re-acquiring by name observes the same records.
    store.counter("c.one").unwrap().add(9);
    assert_eq!(
        store.counters()[1],
        ("c.one".to_string(), 10),
    );
}

#[test]
fn test_store_over_block_allocator() {
    let table = Arc::new(SymbolTable::new());
    let stats_options = StatsOptions::default();
    let allocator = Arc::new(
        BlockStatDataAllocator::new(
            &BlockOptions {
                capacity: 16,
                num_slots: 17,
            },
            &stats_options,
        )
        .unwrap(),
    );
    let store = Store::new(
        Arc::clone(&table),
        Arc::clone(&allocator) as Arc<dyn stats::StatDataAllocator>,
    );

    let rq = store.counter("http.downstream_rq_total").unwrap();
    rq.add(12);
    let cx = store.gauge("http.downstream_cx_active").unwrap();
    cx.set(3);

    assert_eq!(allocator.size(), 2);
    assert_eq!(
        store.counters(),
        vec![("http.downstream_rq_total".to_string(), 12)]
    );
    assert_eq!(
        store.gauges(),
        vec![("http.downstream_cx_active".to_string(), 3)]
    );

    // Handles keep records alive past the store; dropping everything
    // empties both the block and the table.
    drop(store);
    assert_eq!(table.num_symbols(), 0);
    assert_eq!(allocator.size(), 2);
    drop(rq);
    drop(cx);
    assert_eq!(allocator.size(), 0);
}

#[test]
fn test_block_store_truncation_aliases_metrics() {
    let stats_options = StatsOptions {
        max_name_length: 10,
        ..Default::default()
    };
    let store = Store::new(
        Arc::new(SymbolTable::new()),
        Arc::new(
            BlockStatDataAllocator::new(
                &BlockOptions {
                    capacity: 8,
                    num_slots: 13,
                },
                &stats_options,
            )
            .unwrap(),
        ),
    );

    // Distinct long names collapse onto one record once truncated; the
    // store still tracks them as distinct registry entries.
    let a = store.counter("cluster.a.one").unwrap();
    let b = store.counter("cluster.a.two").unwrap();
    a.inc();
    b.inc();
    assert_eq!(a.name(), "cluster.a.");
    assert_eq!(b.name(), "cluster.a.");
    assert_eq!(a.value(), 2);
    assert_eq!(b.value(), 2);
}
