//! CLI benchmark runner: exercises the object pool, ring buffer, and
//! synthetic load generator and reports throughput and latency
//! percentiles, with a pass/fail check against a target.

use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use perf_harness::{LatencyTracker, LoadGenerator, ObjectPool, RingBuffer};

#[derive(Parser, Debug)]
#[command(name = "perf-bench", about = "Pipeline pool/queue/load benchmarks")]
struct Cli {
    #[arg(long, default_value = "info")]
    log: String,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Acquire/release cycles against an `ObjectPool`, reporting
    /// throughput and per-cycle latency.
    Pool {
        #[arg(long, default_value_t = 1_000_000)]
        cycles: u64,
        #[arg(long, default_value_t = 1_024)]
        capacity: usize,
    },
    /// Push/pop cycles against a fixed-size `RingBuffer`.
    Queue {
        #[arg(long, default_value_t = 1_000_000)]
        cycles: u64,
    },
    /// Generate synthetic ticks and report generation throughput.
    Load {
        #[arg(long, default_value_t = 1_000_000)]
        ticks: u64,
        #[arg(long, default_value_t = 100)]
        symbols: u32,
    },
}

fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_env_filter(EnvFilter::new(cli.log)).with_target(false).compact().init();

    match cli.cmd {
        Cmd::Pool { cycles, capacity } => bench_pool(cycles, capacity),
        Cmd::Queue { cycles } => bench_queue(cycles),
        Cmd::Load { ticks, symbols } => bench_load(ticks, symbols),
    }
}

#[derive(Default)]
struct Slot(u64);

fn bench_pool(cycles: u64, capacity: usize) {
    let pool = ObjectPool::<Slot>::new(capacity);
    let tracker = LatencyTracker::default();

    let t0 = Instant::now();
    for i in 0..cycles {
        tracker.measure(|| {
            if let Some(mut slot) = pool.acquire() {
                slot.0 = i;
            }
        });
    }
    let dt = t0.elapsed().as_secs_f64();

    info!("=== POOL BENCHMARK ===");
    info!("cycles: {cycles}, capacity: {capacity}");
    info!("throughput: {:.0} cycles/sec", cycles as f64 / dt);
    print_summary(&tracker);
}

fn bench_queue(cycles: u64) {
    let queue: RingBuffer<u64, 1024> = RingBuffer::new();
    let tracker = LatencyTracker::default();

    let t0 = Instant::now();
    for i in 0..cycles {
        tracker.measure(|| {
            while !queue.push(i) {
                let _ = queue.pop();
            }
            let _ = queue.pop();
        });
    }
    let dt = t0.elapsed().as_secs_f64();

    info!("=== QUEUE BENCHMARK ===");
    info!("cycles: {cycles}");
    info!("throughput: {:.0} cycles/sec", cycles as f64 / dt);
    print_summary(&tracker);
}

fn bench_load(ticks: u64, symbols: u32) {
    let mut generator = LoadGenerator::new(42, symbols);
    let tracker = LatencyTracker::default();

    let t0 = Instant::now();
    for _ in 0..ticks {
        tracker.measure(|| {
            let _ = generator.next_tick();
        });
    }
    let dt = t0.elapsed().as_secs_f64();

    info!("=== LOAD GENERATION BENCHMARK ===");
    info!("ticks: {ticks}, symbols: {symbols}");
    info!("throughput: {:.0} ticks/sec", ticks as f64 / dt);
    print_summary(&tracker);
}

fn print_summary(tracker: &LatencyTracker) {
    let summary = tracker.summary();
    info!(
        "latency: p50={}us p95={}us p99={}us p99.9={}us max={}us",
        summary.p50_us, summary.p95_us, summary.p99_us, summary.p999_us, summary.max_us
    );
}
