//! Alias listings as tables or JSON

use aliasman_core::{Alias, Field};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use serde_json::{Map, Value};

/// Table of aliases restricted to a set of columns
#[derive(Debug, Clone)]
pub struct AliasTable {
    columns: Vec<Field>,
    numbers: bool,
    colors: bool,
}

impl AliasTable {
    pub fn new(columns: Vec<Field>) -> Self {
        Self {
            columns,
            numbers: true,
            colors: false,
        }
    }

    /// Prefix each row with its 1-based position
    pub fn numbers(mut self, numbers: bool) -> Self {
        self.numbers = numbers;
        self
    }

    pub fn colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }

    /// Render `aliases`; an empty listing renders as an empty string.
    pub fn render(&self, aliases: &[Alias]) -> String {
        if aliases.is_empty() {
            return String::new();
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors {
            table.force_no_tty();
        }

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        if self.numbers {
            header.push(Cell::new("#"));
        }
        header.extend(self.columns.iter().map(|f| Cell::new(f.header())));
        table.set_header(header);

        for (i, alias) in aliases.iter().enumerate() {
            let mut row = Vec::with_capacity(self.columns.len() + 1);
            if self.numbers {
                row.push((i + 1).to_string());
            }
            row.extend(self.columns.iter().map(|f| f.render(alias)));
            table.add_row(row);
        }

        table.to_string()
    }
}

fn json_key(field: Field) -> &'static str {
    match field {
        Field::Alias => "alias",
        Field::Domain => "domain",
        Field::EmailAddresses => "email_addresses",
        Field::Description => "description",
        Field::Suspended => "suspended",
        Field::CreatedTs => "created_ts",
        Field::ModifiedTs => "modified_ts",
        Field::SuspendedTs => "suspended_ts",
    }
}

fn json_value(field: Field, alias: &Alias) -> Value {
    let ts = |ts: Option<jiff::Timestamp>| ts.map_or(Value::Null, |t| Value::from(t.to_string()));
    match field {
        Field::EmailAddresses => Value::from(alias.email_addresses.clone()),
        Field::Suspended => Value::from(alias.suspended),
        Field::CreatedTs => ts(alias.created_ts),
        Field::ModifiedTs => ts(alias.modified_ts),
        Field::SuspendedTs => ts(alias.suspended_ts),
        other => Value::from(other.render(alias)),
    }
}

/// JSON array of `aliases`, one object per alias holding only `columns`.
pub fn alias_json(aliases: &[Alias], columns: &[Field]) -> Value {
    aliases
        .iter()
        .map(|alias| {
            let object: Map<String, Value> = columns
                .iter()
                .map(|f| (json_key(*f).to_string(), json_value(*f, alias)))
                .collect();
            Value::Object(object)
        })
        .collect()
}
