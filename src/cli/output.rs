//! Output formatting: every command result renders either as a table for a
//! human at a terminal or as JSON for scripting (`--json`).

use comfy_table::{Cell, Table};
use serde::Serialize;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

pub fn render<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Build a two-column key/value table, the shape most command outputs share.
pub fn kv_table(rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![Cell::new("field"), Cell::new("value")]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(*key), Cell::new(value)]);
    }
    table
}
