//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the medroute CLI.

use crate::types::{ChatEntry, Producer};
use owo_colors::OwoColorize;

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

    /// Print a section header
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}\n", title.bright_white().bold().underline());
        } else {
            println!("\n  {}\n  {}\n", title, "=".repeat(title.len()));
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

    /// Print a hint
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "hint:".cyan().italic(), message.dimmed());
        } else {
            println!("  hint: {}", message);
        }
    }

    /// Print one entry of a conversation log, tagged by producer
    pub fn entry(&self, entry: &ChatEntry) {
        let tag = format!("[{}]", entry.producer);
        if !self.colored {
            println!("  {} {}", tag, entry.content);
            return;
        }

        match entry.producer {
            Producer::User => println!("  {} {}", tag.bright_blue().bold(), entry.content),
            Producer::FinalAnswer => {
                println!("  {} {}", tag.green().bold(), entry.content.bright_white())
            }
            p if p.is_routing() => println!("  {} {}", tag.dimmed(), entry.content.dimmed()),
            _ => println!("  {} {}", tag.magenta().bold(), entry.content),
        }
    }

    /// Print the patient-facing answer of a turn
    pub fn answer(&self, text: &str) {
        if self.colored {
            println!("\n{}\n", text.bright_white());
        } else {
            println!("\n{}\n", text);
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}
