//! `ls` output.

use crate::machine::HostSummary;

const HEADERS: [&str; 6] = ["NAME", "ACTIVE", "DRIVER", "STATE", "URL", "ERRORS"];
const MIN_WIDTH: usize = 5;
const PADDING: usize = 3;

/// Renders the host table. Every column but the last is padded to its
/// widest cell plus three spaces.
#[must_use]
pub fn render_table(rows: &[HostSummary]) -> String {
    let cells: Vec<[String; 6]> = std::iter::once(HEADERS.map(str::to_owned))
        .chain(rows.iter().map(|row| {
            [
                row.name.clone(),
                if row.active { String::from("*") } else { String::new() },
                row.driver_name.clone(),
                row.state.to_string(),
                row.url.clone(),
                row.error.clone().unwrap_or_default(),
            ]
        }))
        .collect();

    let mut widths = [0_usize; HEADERS.len()];
    for line in &cells {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(cell.chars().count() + PADDING).max(MIN_WIDTH);
        }
    }

    let mut out = String::new();
    for line in &cells {
        let mut rendered = String::new();
        for (position, (cell, width)) in line.iter().zip(widths).enumerate() {
            if position + 1 == line.len() {
                rendered.push_str(cell);
            } else {
                rendered.push_str(&format!("{cell:<width$}"));
            }
        }
        out.push_str(rendered.trim_end());
        out.push('\n');
    }
    out
}

/// Renders one host name per line, as printed by `ls -q`.
#[must_use]
pub fn render_names(rows: &[HostSummary]) -> String {
    rows.iter().map(|row| format!("{}\n", row.name)).collect()
}
