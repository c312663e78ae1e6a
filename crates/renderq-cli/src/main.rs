//! renderq demonstration workload
//!
//! Spawns a core thread and a configurable number of producer threads, each
//! queuing deferred commands against its own accessor, and prints the final
//! traffic statistics. Useful for eyeballing throughput and for exercising
//! the subsystem under a realistic many-producer load.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

use renderq_core::QueueConfig;
use renderq_runtime::{CoreHandle, CoreThreadBuilder};

// ----------------------------------------------------------------------------
// Arguments
// ----------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "renderq", about = "Drive a renderq core thread with synthetic producers")]
struct Args {
    /// Number of producer threads
    #[arg(long, default_value_t = 4)]
    producers: usize,

    /// Commands queued by each producer
    #[arg(long, default_value_t = 10_000)]
    commands: usize,

    /// Flush to the core thread after this many queued commands
    #[arg(long, default_value_t = 16)]
    flush_every: usize,

    /// Block on every flush instead of only at the end
    #[arg(long)]
    blocking: bool,

    /// Use the low-volume queue preset (small local buffers, early
    /// large-batch warnings)
    #[arg(long)]
    low_volume: bool,

    /// Verbose (debug-level) logging
    #[arg(long, short)]
    verbose: bool,
}

// ----------------------------------------------------------------------------
// Producer Workload
// ----------------------------------------------------------------------------

/// One producer's workload: queue `commands` increments in chunks, then a
/// return command whose value checks that this producer's subsequence ran
/// in order.
fn run_producer(
    id: usize,
    handle: CoreHandle,
    commands: usize,
    flush_every: usize,
    blocking: bool,
    executed: Arc<AtomicU64>,
) -> anyhow::Result<()> {
    let accessor = handle.accessor();
    let mut queued = 0usize;

    for i in 0..commands {
        let executed = executed.clone();
        accessor.queue_command(move || {
            executed.fetch_add(1, Ordering::Relaxed);
        });
        queued += 1;

        if queued % flush_every == 0 {
            if blocking {
                accessor
                    .submit_and_wait()
                    .with_context(|| format!("producer {id}: blocking flush {i} failed"))?;
            } else {
                accessor
                    .submit()
                    .with_context(|| format!("producer {id}: flush {i} failed"))?;
            }
        }
    }

    // The return command's value proves the tail of the queue executed
    let op = accessor.queue_return_command(move |completer| completer.complete(commands as u64));
    accessor
        .submit_and_wait()
        .with_context(|| format!("producer {id}: final flush failed"))?;

    let confirmed: u64 = op
        .value()
        .with_context(|| format!("producer {id}: result retrieval failed"))?;
    debug!(producer = id, confirmed, "producer finished");
    Ok(())
}

// ----------------------------------------------------------------------------
// Entry Point
// ----------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.flush_every > 0, "--flush-every must be at least 1");

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    info!(
        producers = args.producers,
        commands = args.commands,
        flush_every = args.flush_every,
        blocking = args.blocking,
        "starting workload"
    );

    let queue_config = if args.low_volume {
        QueueConfig::low_volume()
    } else {
        QueueConfig::default()
    };
    let mut core = CoreThreadBuilder::new()
        .queue_config(queue_config)
        .build_and_start()
        .context("failed to start core thread")?;

    let executed = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let mut producers = Vec::new();
    for id in 0..args.producers {
        let handle = core.handle();
        let executed = executed.clone();
        let (commands, flush_every, blocking) = (args.commands, args.flush_every, args.blocking);
        producers.push(thread::spawn(move || {
            run_producer(id, handle, commands, flush_every, blocking, executed)
        }));
    }

    for producer in producers {
        producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))??;
    }

    core.shutdown().context("core thread shutdown failed")?;

    let elapsed = started.elapsed();
    let total = executed.load(Ordering::Relaxed);
    let expected = (args.producers * (args.commands + 1)) as u64; // + one return command each

    info!(
        total_executed = total,
        elapsed_ms = elapsed.as_millis() as u64,
        per_second = (total as f64 / elapsed.as_secs_f64()) as u64,
        "workload complete"
    );
    anyhow::ensure!(
        core.stats().commands_executed == expected,
        "expected {expected} executed commands, stats say {}",
        core.stats().commands_executed
    );

    println!(
        "{}",
        serde_json::to_string_pretty(&core.stats()).context("stats serialization failed")?
    );
    Ok(())
}
