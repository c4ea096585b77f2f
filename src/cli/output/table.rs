//! Table output formatting for CLI commands
//!
//! Provides formatted table output for specs and DoD gate results using
//! comfy-table. Supports color-coded cells, automatic column sizing, and
//! accessibility features.

use crate::domain::models::{CloseLoopSession, DodGateResult, DodGateStatus, Spec, SpecStatus};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use std::env;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    /// Create a new table formatter with custom settings
    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self { use_colors, max_width }
    }

    /// Format the specs of a portfolio (master first, then subs) as a table.
    pub fn format_specs(&self, specs: &[&Spec]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Role").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Dependencies").add_attribute(Attribute::Bold),
            Cell::new("Lease Key").add_attribute(Attribute::Bold),
        ]);

        for spec in specs {
            let status_cell = if self.use_colors {
                Cell::new(format!("{:?}", spec.status)).fg(spec_status_color(&spec.status))
            } else {
                Cell::new(format!("{} {:?}", spec_status_icon(&spec.status), spec.status))
            };

            let mut deps: Vec<&String> = spec.dependencies.iter().collect();
            deps.sort();
            let deps_str = if deps.is_empty() {
                "-".to_string()
            } else {
                deps.iter().map(|d| d.as_str()).collect::<Vec<_>>().join(", ")
            };

            table.add_row(vec![
                Cell::new(&spec.name),
                Cell::new(format!("{:?}", spec.role)),
                status_cell,
                Cell::new(truncate_text(&deps_str, 50)),
                Cell::new(&spec.lease_key),
            ]);
        }

        table.to_string()
    }

    /// Format DoD gate results as a table.
    pub fn format_dod_gates(&self, gates: &[DodGateResult]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Gate").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Message").add_attribute(Attribute::Bold),
        ]);

        for gate in gates {
            let status_cell = if self.use_colors {
                Cell::new(format!("{:?}", gate.status)).fg(dod_status_color(&gate.status))
            } else {
                Cell::new(format!("{} {:?}", dod_status_icon(&gate.status), gate.status))
            };

            table.add_row(vec![
                Cell::new(&gate.id),
                status_cell,
                Cell::new(truncate_text(&gate.message, 60)),
            ]);
        }

        table.to_string()
    }

    /// Format a single close-loop session snapshot as a human-readable summary.
    pub fn format_session(&self, session: &CloseLoopSession) -> String {
        let mut lines = vec![
            format!("Session:      {}", session.session_id),
            format!("Goal:         {}", session.goal),
            format!("Status:       {:?}", session.status),
            format!("Created:      {}", session.created_at),
            format!("Updated:      {}", session.updated_at),
            format!(
                "Replan:       {} cycle(s){}",
                session.replan.performed,
                if session.replan.exhausted { " (exhausted)" } else { "" }
            ),
        ];

        if let Some(orchestration) = &session.orchestration {
            lines.push(format!(
                "Orchestration: {:?} — {} completed, {} failed, {} skipped",
                orchestration.status,
                orchestration.completed.len(),
                orchestration.failed.len(),
                orchestration.skipped.len()
            ));
        }

        let mut all_specs: Vec<&Spec> = vec![&session.portfolio.master_spec];
        all_specs.extend(session.portfolio.sub_specs.iter());
        lines.push(String::new());
        lines.push(self.format_specs(&all_specs));

        if let Some(dod) = &session.dod {
            lines.push(String::new());
            lines.push(format!("DoD: {}", if dod.passed() { "PASSED" } else { "FAILED" }));
            lines.push(self.format_dod_gates(&dod.gates));
        }

        lines.join("\n")
    }

    /// Create a base table with common settings
    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table.load_preset(presets::UTF8_FULL).set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width as u16);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    true
}

fn spec_status_color(status: &SpecStatus) -> Color {
    match status {
        SpecStatus::Completed => Color::Green,
        SpecStatus::InProgress => Color::Cyan,
        SpecStatus::Failed => Color::Red,
        SpecStatus::Blocked => Color::DarkGrey,
        SpecStatus::NotStarted => Color::White,
    }
}

fn spec_status_icon(status: &SpecStatus) -> &'static str {
    match status {
        SpecStatus::Completed => "✓",
        SpecStatus::InProgress => "⟳",
        SpecStatus::Failed => "✗",
        SpecStatus::Blocked => "⊘",
        SpecStatus::NotStarted => "○",
    }
}

fn dod_status_color(status: &DodGateStatus) -> Color {
    match status {
        DodGateStatus::Passed => Color::Green,
        DodGateStatus::Failed => Color::Red,
        DodGateStatus::Skipped => Color::DarkGrey,
    }
}

fn dod_status_icon(status: &DodGateStatus) -> &'static str {
    match status {
        DodGateStatus::Passed => "✓",
        DodGateStatus::Failed => "✗",
        DodGateStatus::Skipped => "⊘",
    }
}

/// Truncate text to max length with ellipsis
fn truncate_text(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        text.to_string()
    } else {
        format!("{}...", &text[..max_len.saturating_sub(3)])
    }
}
