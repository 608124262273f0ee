//! Terminal and JSON rendering of command results
//!
//! Human output goes to stdout with optional color; errors and warnings go
//! to stderr. In JSON mode stdout carries exactly one JSON document.

use aliasman_core::{Alias, Field};
use console::style;
use serde::Serialize;

use super::{AliasTable, OutputConfig, alias_json};

#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Color only for human output without `--no-color`
    pub fn colors_enabled(&self) -> bool {
        !(self.config.no_color || self.config.json)
    }

    /// A result with both a text and a JSON form.
    pub fn output<T: Serialize + std::fmt::Display>(&self, value: &T) {
        match (self.config.quiet, self.config.json) {
            (true, _) => {}
            (false, true) => self.json(value),
            (false, false) => println!("{value}"),
        }
    }

    /// Aliases restricted to `columns`: a table, or a JSON array.
    pub fn aliases(&self, aliases: &[Alias], columns: &[Field]) {
        if self.config.json {
            self.json(&alias_json(aliases, columns));
            return;
        }
        let table = AliasTable::new(columns.to_vec())
            .colors(self.colors_enabled())
            .render(aliases);
        if !table.is_empty() {
            self.println(&table);
        }
    }

    /// Confirmation of a completed change; silent in JSON and quiet mode.
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            println!("{} {message}", style("✓").green());
        } else {
            println!("{message}");
        }
    }

    /// Errors print even in quiet mode. JSON mode wraps them as
    /// `{"error": ...}` on stderr.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let body = serde_json::json!({ "error": message });
            eprintln!("{body}");
        } else if self.colors_enabled() {
            eprintln!("{} {message}", style("Error:").red().bold());
        } else {
            eprintln!("Error: {message}");
        }
    }

    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        if self.colors_enabled() {
            eprintln!("{} {message}", style("Warning:").yellow());
        } else {
            eprintln!("Warning: {message}");
        }
    }

    /// Bold line above a table
    pub fn heading(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        if self.colors_enabled() {
            println!("{}", style(message).bold());
        } else {
            println!("{message}");
        }
    }

    /// Pretty JSON on stdout, regardless of quiet mode.
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}
