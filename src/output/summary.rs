use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::insights::DashboardPayload;

use super::styling::{failure, highlight, muted, project_name, section_title};
use super::tables::{
    color_coded_delta_cell, color_coded_status_cell, create_cyan_header, create_table,
};

/// Prints the dashboard as terminal tables to stdout.
///
/// Sections: overview with last pipeline run, ranked trend rows, and (when
/// the network was requested) the most connected repositories and heaviest
/// edges. Section errors and warnings are printed in place of their tables.
pub fn print_summary(payload: &DashboardPayload) {
    println!("{}", render_summary(payload));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{}", section_title(emoji, title));
}

fn add_notice(output: &mut String, error: Option<&str>, warning: Option<&str>) {
    if let Some(error) = error {
        let _ = writeln!(output, "  {}\n", failure(error));
    }
    if let Some(warning) = warning {
        let _ = writeln!(output, "  {}\n", highlight(warning));
    }
}

fn render_summary(payload: &DashboardPayload) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Overview");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        muted("Project:"),
        project_name(&payload.project_id),
        muted("Window:"),
        highlight(format!("{} days", payload.window_days)),
        muted("Mode:"),
        highlight(payload.trend_mode),
        muted("Generated:"),
        muted(payload.generated_at.format("%Y-%m-%d %H:%M UTC")),
    );

    if let Some(run) = &payload.pipeline_status {
        let mut runs = create_table();
        runs.set_header(create_cyan_header(&[
            "DAG",
            "Run",
            "For",
            "Started",
            "Status",
            "Raw Events",
        ]));
        runs.add_row(vec![
            Cell::new(&run.dag_id),
            Cell::new(&run.run_id),
            Cell::new(&run.executed_for_date),
            Cell::new(&run.run_started_at),
            color_coded_status_cell(&run.status),
            Cell::new(run.raw_events_rows),
        ]);
        let _ = writeln!(output, "{runs}\n");
    }

    add_section_header(&mut output, "📈", "Trending Repositories");
    add_notice(
        &mut output,
        payload.trend_error.as_deref(),
        payload.trend_warning.as_deref(),
    );

    if !payload.trend_rows.is_empty() {
        let mut trends = create_table();
        trends.set_header(create_cyan_header(&[
            "#",
            "Repository",
            "Activity Δ",
            "Contributors Δ",
            "Events",
            "Contributors",
            "Score",
            "Last Activity",
        ]));

        for (idx, row) in payload.trend_rows.iter().enumerate() {
            let name = if row.has_exact_baseline {
                Cell::new(&row.repo_name)
            } else {
                Cell::new(format!("{} *", row.repo_name))
            };
            trends.add_row(vec![
                Cell::new(idx + 1),
                name,
                color_coded_delta_cell(row.activity_delta_window),
                color_coded_delta_cell(row.contributors_delta_window),
                Cell::new(row.stars_total),
                Cell::new(row.forks_total),
                color_coded_delta_cell(row.delta_score),
                Cell::new(&row.last_activity_date).fg(TableColor::DarkGrey),
            ]);
        }

        let _ = writeln!(output, "{trends}");
        let _ = writeln!(output, "  {}\n", muted("* no activity in the previous window"));
    }

    if !payload.include_network {
        return output;
    }

    add_section_header(&mut output, "🕸️", "Contributor Network");
    add_notice(&mut output, payload.edge_error.as_deref(), None);

    if payload.edge_rows.is_empty() {
        if payload.edge_error.is_none() {
            let _ = writeln!(output, "  {}\n", muted("No shared contributors in this window."));
        }
        return output;
    }

    let mut degrees = create_table();
    degrees.set_header(create_cyan_header(&["#", "Repository", "Weighted Degree"]));
    for (idx, row) in payload.degree_rows.iter().enumerate() {
        degrees.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(&row.repo_name),
            Cell::new(row.degree),
        ]);
    }
    let _ = writeln!(output, "{degrees}\n");

    let mut edges = create_table();
    edges.set_header(create_cyan_header(&["Source", "Target", "Shared"]));
    for edge in payload.edge_rows.iter().take(20) {
        edges.add_row(vec![
            Cell::new(&edge.source_repo),
            Cell::new(&edge.target_repo),
            Cell::new(edge.shared_contributor_count),
        ]);
    }
    if payload.edge_rows.len() > 20 {
        edges.add_row(vec![
            Cell::new(format!("... and {} more", payload.edge_rows.len() - 20))
                .fg(TableColor::DarkGrey),
            Cell::new(""),
            Cell::new(""),
        ]);
    }
    let _ = writeln!(output, "{edges}\n");

    output
}
