use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// Signed delta: green when growing, red when shrinking.
pub fn color_coded_delta_cell(delta: i64) -> Cell {
    let text = format!("{delta:+}");
    match delta {
        d if d > 0 => Cell::new(text).fg(TableColor::Green),
        0 => Cell::new(text).fg(TableColor::DarkGrey),
        _ => Cell::new(text).fg(TableColor::Red),
    }
}

pub fn color_coded_status_cell(status: &str) -> Cell {
    let color = match status.to_ascii_lowercase().as_str() {
        "success" | "succeeded" | "ok" => TableColor::Green,
        "running" | "queued" | "unknown" => TableColor::Yellow,
        _ => TableColor::Red,
    };
    Cell::new(status).fg(color)
}
