//! Output formatting for CLI

use chrono::{TimeZone, Utc};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use testdeck_common::{Fixture, Project, RunStatus, Step, TestCase, TestResult, Version};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Json => print_json(item),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(items),
        OutputFormat::Table if items.is_empty() => println!("No items found."),
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "!".yellow(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// `YYYY-MM-DD HH:MM:SS` in UTC for epoch milliseconds
pub fn format_millis(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Shorten to `max` characters, marking the cut with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

fn status_cell(status: RunStatus) -> String {
    let text = status.to_string();
    match status {
        RunStatus::Completed => text.green().to_string(),
        RunStatus::Failed => text.red().to_string(),
        RunStatus::Running => text.cyan().to_string(),
        RunStatus::Pending => text.dimmed().to_string(),
    }
}

impl TableDisplay for Project {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "URL", "Environment", "Updated"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            opt(&self.url),
            opt(&self.environment),
            format_millis(self.updated_at),
        ]
    }
}

impl TableDisplay for TestCase {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Status", "Tags", "Manual", "Version"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.status.to_string(),
            self.tags.join(", "),
            if self.is_manual { "yes" } else { "no" }.to_string(),
            self.current_version.to_string(),
        ]
    }
}

impl TableDisplay for Fixture {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Type", "Export", "Tags", "Version"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.fixture_type.to_string(),
            opt(&self.export_name),
            self.tags.join(", "),
            self.current_version.to_string(),
        ]
    }
}

impl TableDisplay for Step {
    fn headers() -> Vec<&'static str> {
        vec!["#", "ID", "Action", "Expected", "Fixture", "Script"]
    }

    fn row(&self) -> Vec<String> {
        let action = if self.disabled {
            format!("{} (disabled)", self.action).dimmed().to_string()
        } else {
            self.action.clone()
        };
        vec![
            self.order.to_string(),
            self.id.clone(),
            action,
            opt(&self.expected),
            opt(&self.fixture_ref),
            self.playwright_script
                .as_deref()
                .map(|s| truncate(s.lines().next().unwrap_or_default(), 48))
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

impl TableDisplay for Version {
    fn headers() -> Vec<&'static str> {
        vec!["Version", "ID", "Name", "Steps", "Reverted from", "By", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.version.to_string(),
            self.id.clone(),
            self.name.clone(),
            self.steps.len().to_string(),
            self.reverted_from
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string()),
            opt(&self.created_by),
            format_millis(self.created_at),
        ]
    }
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Status", "Success", "Browser", "Cases", "Duration", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            status_cell(self.status),
            self.success.to_string(),
            self.browser.clone(),
            self.executions.len().to_string(),
            self.duration_ms
                .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
                .unwrap_or_else(|| "-".to_string()),
            format_millis(self.created_at),
        ]
    }
}
