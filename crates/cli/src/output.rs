//! Output formatting utilities

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a value in the requested format: its table rows, or the value as JSON
pub fn print_output<V, T>(value: &V, rows: impl FnOnce() -> Vec<T>, format: OutputFormat) -> Result<()>
where
    V: Serialize,
    T: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows = rows();
            if rows.is_empty() {
                println!("{}", "No items found".yellow());
            } else {
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format MiB as human-readable string
pub fn format_mib(mib: u64) -> String {
    const MIB_PER_GIB: u64 = 1024;

    if mib >= MIB_PER_GIB {
        format!("{:.2}Gi", mib as f64 / MIB_PER_GIB as f64)
    } else {
        format!("{}Mi", mib)
    }
}

/// Format millicores as human-readable string
pub fn format_cpu(millicores: u64) -> String {
    if millicores >= 1000 {
        format!("{:.1}", millicores as f64 / 1000.0)
    } else {
        format!("{}m", millicores)
    }
}

/// Format a fractional millicore figure from the safety check, truncated
/// to whole millicores
pub fn format_cpu_f64(millicores: f64) -> String {
    format!("{}m", millicores.floor())
}

/// Color a capacity status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "live" | "ok" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "breach" => status.red().to_string(),
        _ => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_cpu() {
        assert_eq!(format_cpu(800), "800m");
        assert_eq!(format_cpu(1600), "1.6");
        assert_eq!(format_cpu_f64(4800.0), "4800m");
        assert_eq!(format_cpu_f64(4800.9), "4800m");
    }

    #[test]
    fn test_color_status_keeps_text() {
        assert!(color_status("degraded").contains("degraded"));
        assert_eq!(color_status("unknown"), "unknown");
    }

    #[test]
    fn test_format_mib() {
        assert_eq!(format_mib(512), "512Mi");
        assert_eq!(format_mib(2048), "2.00Gi");
        assert_eq!(format_mib(2400), "2.34Gi");
    }
}
