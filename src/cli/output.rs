//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the statechat CLI.

use owo_colors::OwoColorize;

use crate::workflows::{AgentStatus, Program, WorkflowReport};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the statechat banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "statechat".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   statechat v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    fn table_line(columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| format!("{:<15}", c))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header = Self::table_line(columns);
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 16).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 16));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        println!("    {}", Self::table_line(values));
    }

    /// Summarize the agents and states of a loaded workflow
    pub fn program_summary(&self, program: &Program) {
        self.header("Agents");
        for agent in program.agents() {
            let states: Vec<&str> = agent.states().iter().map(|s| s.name()).collect();
            self.list_item(&format!("{} ({})", agent.name(), states.join(" → ")));
        }
    }

    /// Print the per-agent outcome table of a run
    pub fn report(&self, report: &WorkflowReport) {
        self.header("Run report");
        self.kv("run", &report.run_id.to_string());
        self.kv("duration", &format!("{} ms", report.duration_ms));
        self.newline();

        self.table_header(&["Agent", "Status", "State", "Messages", "Turns"]);
        for agent in &report.agents {
            let status = match &agent.status {
                AgentStatus::Terminated => "terminated",
                AgentStatus::Failed(_) => "failed",
            };
            let messages = agent.messages.to_string();
            let turns = agent.turns.to_string();
            self.table_row(&[&agent.agent, status, &agent.final_state, &messages, &turns]);
        }

        for agent in report.failed() {
            if let AgentStatus::Failed(reason) = &agent.status {
                self.error(&format!("{}: {}", agent.agent, reason));
            }
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
