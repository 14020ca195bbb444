//! In-process stats stress harness — hammers one shared symbol table and
//! store from many threads, reports throughput, and verifies the table
//! drains to zero symbols on shutdown.

mod config;
mod logging;
mod worker;

use crate::config::{AllocatorBackend, Config};
use crate::worker::SharedState;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

use stats::{
    BlockOptions, BlockStatDataAllocator, HeapStatDataAllocator, StatDataAllocator, StatsOptions,
    Store, SymbolTable,
};

#[derive(Parser)]
#[command(name = "stats-bench")]
#[command(about = "In-process stats subsystem stress harness")]
struct Args {
    /// Path to configuration file
    config: PathBuf,
}

fn main() {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    logging::init(&config.logging);

    if let Err(e) = run(config) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let stats_options = StatsOptions::default();
    let allocator: Arc<dyn StatDataAllocator> = match config.allocator.backend {
        AllocatorBackend::Heap => Arc::new(HeapStatDataAllocator::new(stats_options)),
        AllocatorBackend::Block => Arc::new(BlockStatDataAllocator::new(
            &BlockOptions {
                capacity: config.allocator.capacity,
                num_slots: config.allocator.num_slots,
            },
            &stats_options,
        )?),
    };

    let table = Arc::new(SymbolTable::new());
    let store = Arc::new(Store::new(Arc::clone(&table), allocator));
    let shared = Arc::new(SharedState::new());

    info!(
        threads = config.general.threads,
        duration = %humantime::format_duration(config.general.duration),
        backend = %config.allocator.backend,
        tokens = config.workload.tokens,
        depth = config.workload.depth,
        "starting workload"
    );

    let config = Arc::new(config);
    let mut handles = Vec::with_capacity(config.general.threads);
    for id in 0..config.general.threads {
        let config = Arc::clone(&config);
        let table = Arc::clone(&table);
        let store = Arc::clone(&store);
        let shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || worker::run_worker(id, &config, &table, &store, &shared))?;
        handles.push(handle);
    }

    // Reporting loop.
    let start = Instant::now();
    let mut last_report = start;
    let mut last_ops = 0u64;
    while start.elapsed() < config.general.duration {
        thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() >= Duration::from_secs(1) {
            let ops = shared.ops();
            let rate = (ops - last_ops) as f64 / last_report.elapsed().as_secs_f64();
            info!(
                ops_per_sec = rate as u64,
                live_symbols = table.num_symbols(),
                "progress"
            );
            last_ops = ops;
            last_report = Instant::now();
        }
    }

    shared.stop();
    for handle in handles {
        let _ = handle.join();
    }

    let total = shared.ops();
    let elapsed = start.elapsed().as_secs_f64();
    info!(
        total_ops = total,
        ops_per_sec = (total as f64 / elapsed) as u64,
        "workload complete"
    );

    // The store still pins the counters' symbols; dropping it must drain
    // the table completely.
    let counters = store.counters();
    info!(metrics = counters.len(), "final registry size");
    drop(store);
    let leaked = table.num_symbols();
    if leaked != 0 {
        table.debug_dump();
        return Err(format!("symbol table leak: {leaked} symbols still live").into());
    }
    info!("symbol table drained cleanly");

    Ok(())
}
