//! Basic logger usage example
//!
//! Demonstrates synchronous console logging, leveled calls and child loggers.
//!
//! Run with: cargo run --example basic_usage

use sparrow_log::prelude::*;

fn main() -> Result<()> {
    println!("=== sparrow_log - Basic Usage Example ===\n");

    let config = Config {
        enable_console: true,
        enable_file: false,
        async_write: false,
        level: "debug".to_string(),
        console_level: "debug".to_string(),
        prefix: "demo".to_string(),
        ..Config::default()
    };
    let (logger, guard) = config.build()?;

    println!("1. Logging at different levels:");
    logger.debug("This is a debug message", &[]);
    logger.info("This is an info message", &[Field::string("user", "alice")]);
    logger.warnw("This is a warning message", [("attempt", 3_i64)]);
    logger.errorf(format_args!("This is an error message: {}", "disk full"));

    println!("\n2. Logging with different minimum levels:");
    logger.set_level(LogLevel::Warn);
    println!("   Minimum level set to WARN - debug and info won't show:");
    logger.debug("Debug message (hidden)", &[]);
    logger.info("Info message (hidden)", &[]);
    logger.warn("Warning message (visible)", &[]);

    println!("\n3. Child loggers share the level and carry fields:");
    let auth = logger.named("auth").with(&[Field::string("component", "login")]);
    auth.error("Invalid credentials", &[Field::int("user_id", 42)]);
    logger.set_level(LogLevel::Info);
    sparrow_log::info!(auth, "Level restored to {}", logger.level());

    guard.close()?;
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
