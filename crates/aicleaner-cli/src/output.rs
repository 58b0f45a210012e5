// Output formatting and styling

use aicleaner_providers::{CircuitState, DeviceStatus};
use colored::Colorize;

use crate::logging::VerbosityLevel;

/// Output styling configuration
pub struct OutputStyle {
    pub use_colors: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl OutputStyle {
    /// Format success message
    pub fn success(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✓".green().bold(), msg)
        } else {
            format!("✓ {}", msg)
        }
    }

    /// Format error message
    pub fn error(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "✗".red().bold(), msg)
        } else {
            format!("✗ {}", msg)
        }
    }

    /// Format warning message
    pub fn warning(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "⚠".yellow(), msg)
        } else {
            format!("⚠ {}", msg)
        }
    }

    /// Format info message
    pub fn info(&self, msg: &str) -> String {
        if self.use_colors {
            format!("{} {}", "ℹ".blue(), msg)
        } else {
            format!("ℹ {}", msg)
        }
    }

    /// Format a section header
    pub fn section(&self, title: &str) -> String {
        let rule = "─".repeat(title.chars().count());
        if self.use_colors {
            format!("\n{}\n{}", title.bold().underline(), rule)
        } else {
            format!("\n{}\n{}", title, rule)
        }
    }

    /// Format a list item
    pub fn list_item(&self, item: &str) -> String {
        format!("  • {}", item)
    }

    /// Format a key-value pair
    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.use_colors {
            format!("  {}: {}", key.bold(), value)
        } else {
            format!("  {}: {}", key, value)
        }
    }

    /// Circuit state, green when closed and red when open
    pub fn circuit(&self, state: CircuitState) -> String {
        let label = state.to_string();
        if !self.use_colors {
            return label;
        }
        match state {
            CircuitState::Closed => label.green().to_string(),
            CircuitState::HalfOpen => label.yellow().to_string(),
            CircuitState::Open => label.red().to_string(),
        }
    }

    /// Overall device status
    pub fn device_status(&self, status: DeviceStatus) -> String {
        let label = status.to_string();
        if !self.use_colors {
            return label;
        }
        match status {
            DeviceStatus::Online => label.green().bold().to_string(),
            DeviceStatus::Degraded => label.yellow().bold().to_string(),
            DeviceStatus::Offline => label.red().bold().to_string(),
        }
    }

    /// Pad `cell` to `width` columns, then style it
    ///
    /// Padding happens before coloring so escape codes do not skew alignment.
    pub fn cell(&self, cell: &str, width: usize) -> String {
        format!("{:<width$}", cell, width = width)
    }

    /// Format a table header row
    pub fn table_header(&self, columns: &[(&str, usize)]) -> String {
        let row = columns
            .iter()
            .map(|(title, width)| self.cell(title, *width))
            .collect::<Vec<_>>()
            .join(" ");
        let row = row.trim_end().to_string();
        if self.use_colors {
            row.bold().to_string()
        } else {
            row
        }
    }
}

/// Print formatted output
pub fn print_success(msg: &str) {
    if VerbosityLevel::Normal.should_output() {
        println!("{}", OutputStyle::default().success(msg));
    }
}

pub fn print_error(msg: &str) {
    let style = OutputStyle {
        use_colors: atty::is(atty::Stream::Stderr),
    };
    eprintln!("{}", style.error(msg));
}

pub fn print_warning(msg: &str) {
    if VerbosityLevel::Normal.should_output() {
        println!("{}", OutputStyle::default().warning(msg));
    }
}

pub fn print_info(msg: &str) {
    if VerbosityLevel::Normal.should_output() {
        println!("{}", OutputStyle::default().info(msg));
    }
}

/// Print a line as is, unless quiet
pub fn print_plain(msg: &str) {
    if VerbosityLevel::Normal.should_output() {
        println!("{}", msg);
    }
}

/// Print only with `--verbose`
pub fn print_detail(msg: &str) {
    if VerbosityLevel::Verbose.should_output() {
        println!("{}", msg);
    }
}
