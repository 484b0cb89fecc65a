//! Output helpers for CLI commands. Everything the CLI prints is JSON.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;

/// Print data as pretty JSON on stdout
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    write_json(&mut std::io::stdout().lock(), data)
}

/// Print the outcome of a command that returns no data
pub fn print_status(path: &str, status: &str) -> Result<()> {
    print_json(&status_body(path, status))
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, data: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, data).context("Failed to serialize to JSON")?;
    writeln!(writer).context("Failed to write output")?;
    Ok(())
}

fn status_body(path: &str, status: &str) -> Value {
    json!({ "path": path, "status": status })
}
