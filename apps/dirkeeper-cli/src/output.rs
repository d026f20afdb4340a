//! Terminal output helpers

use serde::Serialize;

use crate::error::CliResult;

fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a labelled value
pub fn print_key_value(key: &str, value: &str) {
    if use_color() {
        println!("  \x1b[1m{}:\x1b[0m {}", key, value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Print a success line
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("OK {}", message);
    }
}

/// Print a failure line without aborting
pub fn print_failure(message: &str) {
    if use_color() {
        println!("\x1b[31m✗\x1b[0m {}", message);
    } else {
        println!("FAILED {}", message);
    }
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
