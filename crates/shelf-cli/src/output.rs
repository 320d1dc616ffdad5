use atty::Stream;
use color_eyre::Result;
use serde_json::Value;
use shelf_core::{CommandInfo, CommandStatus, ExecutionOutcome};

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Prints an outcome and returns the process exit code.
pub fn emit_output(opts: &OutputOptions, info: CommandInfo, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();

    if opts.json {
        let payload = shelf_core::to_json_response(info, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(code);
    }

    let style_out = Style::new(opts.no_color, atty::is(Stream::Stdout));
    let style_err = Style::new(opts.no_color, atty::is(Stream::Stderr));

    match outcome.status {
        CommandStatus::Ok => {
            for warning in string_list(&outcome.details, "warnings") {
                eprintln!("{}", style_err.warning(&format!("warning: {warning}")));
            }
            if opts.quiet {
                return Ok(code);
            }
            if is_passthrough(&outcome.details) {
                println!("{}", outcome.message);
                return Ok(code);
            }
            let message = shelf_core::format_status_message(info, &outcome.message);
            println!("{}", style_out.status(&outcome.status, &message));
            for note in string_list(&outcome.details, "notes") {
                println!("{}", style_out.info(&format!("  {note}")));
            }
            if let Some(table) = render_table(&style_out, &outcome.details) {
                println!("{table}");
            }
            if let Some(hint) = hint_from_details(&outcome.details) {
                println!("{}", style_out.info(&format!("Hint: {hint}")));
            }
        }
        CommandStatus::UserError | CommandStatus::Failure => {
            let message = shelf_core::format_status_message(info, &outcome.message);
            eprintln!("{}", style_err.status(&outcome.status, &message));
            let issues = string_list(&outcome.details, "issues");
            if issues.len() > 1 {
                eprintln!();
                eprintln!("Why:");
                for issue in issues.iter().skip(1) {
                    eprintln!("  • {issue}");
                }
            }
            if let Some(hint) = hint_from_details(&outcome.details) {
                eprintln!("{}", style_err.info(&format!("Hint: {hint}")));
            }
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn is_passthrough(details: &Value) -> bool {
    details
        .as_object()
        .and_then(|map| map.get("passthrough"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn string_list<'a>(details: &'a Value, key: &str) -> Vec<&'a str> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

/// Renders `details.table` (`{columns, rows}`) as aligned text.
fn render_table(style: &Style, details: &Value) -> Option<String> {
    let table = details.get("table")?;
    let headers: Vec<String> = table
        .get("columns")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_uppercase)
        .collect();
    let rows: Vec<Vec<String>> = table
        .get("rows")?
        .as_array()?
        .iter()
        .filter_map(Value::as_array)
        .map(|cells| {
            cells
                .iter()
                .map(|cell| cell.as_str().map_or_else(|| cell.to_string(), str::to_string))
                .collect()
        })
        .collect();
    if rows.is_empty() {
        return None;
    }
    Some(format_table(style, &headers, &rows))
}

fn format_table(style: &Style, headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(style.table_header(&line(headers)));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        lines.push(line(row.as_slice()));
    }
    lines.join("\n")
}
