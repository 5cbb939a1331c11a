//! Async logging example
//!
//! Demonstrates buffered writes from many threads and a clean shutdown.
//!
//! Run with: cargo run --example async_logging

use sparrow_log::prelude::*;
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    println!("=== sparrow_log - Async Logging Example ===\n");

    let config = Config {
        enable_console: true,
        enable_file: false,
        async_write: true,
        buffer_size: 64 * 1024,
        flush_interval: Duration::from_millis(50),
        ..Config::default()
    };
    let (logger, guard) = config.build()?;

    println!("1. Logging from 4 threads:");
    let start = Instant::now();
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let logger = logger.with(&[Field::int("worker", t)]);
            thread::spawn(move || {
                for i in 0..250 {
                    sparrow_log::info!(logger, "processing item {}", i);
                }
            })
        })
        .collect();
    for handle in handles {
        let _ = handle.join();
    }
    let elapsed = start.elapsed();

    logger.flush()?;
    println!("\n2. Metrics:");
    let metrics = logger.metrics();
    println!("   Logged:  {}", metrics.total_logged());
    println!("   Dropped: {}", metrics.dropped_count());
    println!("   Blocked: {}", metrics.block_events());
    println!("   Elapsed: {:?}", elapsed);

    // Drains the buffer and stops the flush thread
    guard.close()?;

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
