//! # Utility Functions Module
//!
//! Helpers shared by the binary and the orchestrator: configuration
//! validation and console table rendering for the comparison report.
//!
//! ## Key Features
//!
//! - **Validation**: range checks on load parameters and query lists
//! - **Tables**: fixed-width console tables for the sweep comparison
//!
//! ## Usage Examples
//!
//! ```rust
//! use search_benchmark::utils::{validate_concurrency, print_table_row, print_table_separator};
//!
//! # fn main() -> anyhow::Result<()> {
//! validate_concurrency(10)?;
//!
//! let widths = [12, 10];
//! print_table_separator(&widths);
//! print_table_row(&["Backend", "Errors"], &widths);
//! print_table_separator(&widths);
//! # Ok(())
//! # }
//! ```

use crate::metrics::utils::{format_latency, format_rate};
use crate::metrics::MetricKind;
use crate::orchestrator::BenchmarkRun;
use anyhow::Result;

/// Validate concurrency level
///
/// ## Parameters
/// - `concurrency`: Number of requests in flight per load run
///
/// ## Returns
/// - `Ok(())`: Concurrency level is valid
/// - `Err(anyhow::Error)`: Concurrency level is zero or above the maximum
///
/// ## Validation Rules
///
/// - **Minimum**: 1 request in flight
/// - **Maximum**: `defaults::MAX_CONCURRENCY` (1024)
pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        anyhow::bail!("Concurrency cannot be zero");
    }
    if concurrency > crate::defaults::MAX_CONCURRENCY {
        anyhow::bail!(
            "Concurrency {} is too high (maximum {})",
            concurrency,
            crate::defaults::MAX_CONCURRENCY
        );
    }
    Ok(())
}

/// Validate the query list of a sweep
///
/// The list must be non-empty and every query must contain something other
/// than whitespace.
pub fn validate_queries(queries: &[String]) -> Result<()> {
    if queries.is_empty() {
        anyhow::bail!("Query list cannot be empty");
    }
    if let Some(position) = queries.iter().position(|q| q.trim().is_empty()) {
        anyhow::bail!("Query #{} is blank", position + 1);
    }
    Ok(())
}

/// Print a formatted table row
///
/// ## Parameters
/// - `columns`: Cell contents, left to right
/// - `widths`: Column widths; missing entries default to 10
///
/// ## Examples
///
/// ```rust
/// # use search_benchmark::utils::{print_table_row, print_table_separator};
/// let widths = [12, 10, 12];
/// print_table_separator(&widths);
/// print_table_row(&["Backend", "Errors", "Throughput"], &widths);
/// print_table_separator(&widths);
/// ```
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    println!("{}", format_table_row(columns, widths));
}

/// Print a table separator matching `widths`
pub fn print_table_separator(widths: &[usize]) {
    println!("{}", format_table_separator(widths));
}

fn format_table_row(columns: &[&str], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (i, column) in columns.iter().enumerate() {
        let width = widths.get(i).copied().unwrap_or(10);
        line.push_str(&format!(" {:width$} |", column, width = width));
    }
    line
}

fn format_table_separator(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for &width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line
}

/// Render one metric cell of the comparison table
fn format_metric(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::AvgLatency | MetricKind::MedianLatency => format_latency(value),
        MetricKind::Throughput => format_rate(value, "req"),
        MetricKind::Errors => format!("{}", value as u64),
    }
}

/// Print the sweep comparison: one table per metric, one row per query,
/// one column per backend
pub fn print_comparison(run: &BenchmarkRun) {
    let backends: Vec<&str> = run.backends().collect();
    if backends.is_empty() || run.queries.is_empty() {
        return;
    }

    let query_width = run
        .queries
        .iter()
        .map(|q| q.chars().count())
        .max()
        .unwrap_or(0)
        .max("Query".len());
    let mut widths = vec![query_width];
    widths.extend(backends.iter().map(|b| b.len().max(14)));

    for kind in MetricKind::ALL {
        println!();
        println!("{}", kind);
        print_table_separator(&widths);
        let mut header = vec!["Query"];
        header.extend(backends.iter().copied());
        print_table_row(&header, &widths);
        print_table_separator(&widths);

        for (i, query) in run.queries.iter().enumerate() {
            let cells: Vec<String> = backends
                .iter()
                .map(|backend| {
                    run.series(backend, kind)
                        .and_then(|values| values.get(i))
                        .map(|value| format_metric(kind, *value))
                        .unwrap_or_else(|| "-".to_string())
                })
                .collect();

            let mut row = vec![query.as_str()];
            row.extend(cells.iter().map(String::as_str));
            print_table_row(&row, &widths);
        }
        print_table_separator(&widths);
    }
}
