//! File logging example
//!
//! Demonstrates JSON file output with size-based rotation and compressed archives.
//!
//! Run with: cargo run --example file_logging

use sparrow_log::prelude::*;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== sparrow_log - File Logging Example ===\n");

    let dir = std::env::temp_dir().join("sparrow_log_demo");
    let config = Config {
        enable_console: true,
        enable_file: true,
        async_write: false,
        dir: dir.display().to_string(),
        name: "app.log".to_string(),
        max_size: 1,
        max_backup: 3,
        compress: true,
        fields: vec![Field::string("service", "file-demo")],
        ..Config::default()
    };
    println!("1. Logging to {}", config.filename());
    let (logger, guard) = config.build()?;

    logger.info("Application started", &[]);
    for i in 0..20_000 {
        logger.infow(
            "request handled",
            [
                ("request", FieldValue::from(i as i64)),
                ("elapsed", FieldValue::from(Duration::from_micros(250 + i % 100))),
            ],
        );
    }
    logger.warn("Shutting down", &[]);
    guard.close()?;

    println!("\n2. Files after rotation:");
    let mut entries: Vec<_> = std::fs::read_dir(&dir)
        .map_err(|e| LoggerError::io_operation("read_dir", dir.display().to_string(), e))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();
    for name in entries {
        println!("   {}", name);
    }

    println!("\n=== Example completed successfully! ===");
    Ok(())
}
