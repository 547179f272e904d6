// SPDX-License-Identifier: MIT

//! Text/JSON output formatting shared across command handlers, grounded on
//! the teacher's `oj` CLI output helpers.

use clap::ValueEnum;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render a list as a JSON array or via `render_text`, with an empty-state message.
pub fn handle_list<T: Serialize>(
    format: OutputFormat,
    items: &[T],
    empty_msg: &str,
    render_text: impl FnOnce(&[T]),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Text => {
            if items.is_empty() {
                println!("{empty_msg}");
            } else {
                render_text(items);
            }
        }
    }
    Ok(())
}

/// Format-branch helper for single-item commands (show, add, cancel).
pub fn format_or_json<T: Serialize>(
    format: OutputFormat,
    data: &T,
    text_fn: impl FnOnce(),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => text_fn(),
    }
    Ok(())
}
