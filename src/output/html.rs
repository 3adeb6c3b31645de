use std::fmt::{self, Write};

use crate::analytics::ALLOWED_WINDOW_DAYS;
use crate::insights::DashboardPayload;

/// Turns a dashboard payload into a full HTML page.
pub trait PageRenderer: Send + Sync {
    fn render(&self, payload: &DashboardPayload) -> Result<String, fmt::Error>;
}

/// Self-contained page with inline styles and plain tables.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl PageRenderer for HtmlRenderer {
    fn render(&self, payload: &DashboardPayload) -> Result<String, fmt::Error> {
        let mut page = String::with_capacity(16 * 1024);
        write_page(payload, &mut page)?;
        Ok(page)
    }
}

/// Escape text for element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn delta_class(delta: i64) -> &'static str {
    match delta {
        d if d > 0 => "good",
        0 => "flat",
        _ => "bad",
    }
}

fn write_page(p: &DashboardPayload, out: &mut String) -> fmt::Result {
    let project = escape(&p.project_id);
    let network = if p.include_network { 1 } else { 0 };

    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "    <meta charset=\"UTF-8\">")?;
    writeln!(out, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
    writeln!(out, "    <title>repopulse - {project}</title>")?;
    writeln!(out, "    <style>")?;
    writeln!(out, "        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 40px; background: #f5f5f5; }}")?;
    writeln!(out, "        .container {{ max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}")?;
    writeln!(out, "        h1 {{ color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px; }}")?;
    writeln!(out, "        h2 {{ color: #34495e; margin-top: 30px; }}")?;
    writeln!(out, "        .summary {{ background: #ecf0f1; padding: 20px; border-radius: 5px; margin: 20px 0; }}")?;
    writeln!(out, "        .notice {{ padding: 12px 16px; border-radius: 5px; margin: 12px 0; }}")?;
    writeln!(out, "        .notice.error {{ background: #fdecea; color: #c0392b; }}")?;
    writeln!(out, "        .notice.warning {{ background: #fef5e7; color: #b9770e; }}")?;
    writeln!(out, "        nav a {{ margin-right: 12px; }}")?;
    writeln!(out, "        nav a.active {{ font-weight: bold; }}")?;
    writeln!(out, "        table {{ width: 100%; border-collapse: collapse; margin: 20px 0; }}")?;
    writeln!(out, "        th, td {{ padding: 10px; text-align: left; border-bottom: 1px solid #ddd; }}")?;
    writeln!(out, "        th {{ background: #3498db; color: white; }}")?;
    writeln!(out, "        tr:nth-child(even) {{ background: #f8f9fa; }}")?;
    writeln!(out, "        .good {{ color: #27ae60; }}")?;
    writeln!(out, "        .flat {{ color: #7f8c8d; }}")?;
    writeln!(out, "        .bad {{ color: #e74c3c; }}")?;
    writeln!(out, "    </style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "    <div class=\"container\">")?;
    writeln!(out, "        <h1>repopulse: OSS Repository Trends</h1>")?;

    writeln!(out, "        <nav>")?;
    for days in ALLOWED_WINDOW_DAYS {
        let class = if days == p.window_days { " class=\"active\"" } else { "" };
        writeln!(
            out,
            "            <a{class} href=\"/?window={days}&amp;trend_mode={}&amp;network={network}\">{days}D</a>",
            p.trend_mode
        )?;
    }
    let toggled = 1 - network;
    let toggle_label = if p.include_network { "Hide network" } else { "Show network" };
    writeln!(
        out,
        "            <a href=\"/?window={}&amp;trend_mode={}&amp;network={toggled}\">{toggle_label}</a>",
        p.window_days, p.trend_mode
    )?;
    writeln!(out, "        </nav>")?;

    writeln!(out, "        <div class=\"summary\">")?;
    writeln!(out, "            <p><strong>Project:</strong> {project}</p>")?;
    writeln!(out, "            <p><strong>Window:</strong> {} days</p>", p.window_days)?;
    writeln!(out, "            <p><strong>Mode:</strong> {}</p>", p.trend_mode)?;
    writeln!(out, "            <p><strong>Generated:</strong> {}</p>", p.generated_at.format("%Y-%m-%d %H:%M UTC"))?;
    match &p.pipeline_status {
        Some(run) => {
            writeln!(
                out,
                "            <p><strong>Last pipeline run:</strong> {} ({}) for {} started {}, {} raw events</p>",
                escape(&run.status),
                escape(&run.dag_id),
                escape(&run.executed_for_date),
                escape(&run.run_started_at),
                run.raw_events_rows
            )?;
        }
        None => writeln!(out, "            <p><strong>Last pipeline run:</strong> unavailable</p>")?,
    }
    writeln!(out, "        </div>")?;

    write_notice(out, "error", p.trend_error.as_deref())?;
    write_notice(out, "warning", p.trend_warning.as_deref())?;

    writeln!(out, "        <h2>Trending Repositories</h2>")?;
    if p.trend_rows.is_empty() {
        writeln!(out, "        <p>No trend rows.</p>")?;
    } else {
        writeln!(out, "        <table>")?;
        writeln!(out, "            <thead>")?;
        writeln!(out, "                <tr><th>#</th><th>Repository</th><th>Activity &Delta;</th><th>Contributors &Delta;</th><th>Events</th><th>Contributors</th><th>Score</th><th>Last Activity</th></tr>")?;
        writeln!(out, "            </thead>")?;
        writeln!(out, "            <tbody>")?;
        for (rank, row) in p.trend_rows.iter().enumerate() {
            let name = escape(&row.repo_name);
            writeln!(out, "                <tr>")?;
            writeln!(out, "                    <td>{}</td>", rank + 1)?;
            writeln!(out, "                    <td><a href=\"https://github.com/{name}\">{name}</a></td>")?;
            writeln!(out, "                    <td class=\"{}\">{:+}</td>", delta_class(row.activity_delta_window), row.activity_delta_window)?;
            writeln!(out, "                    <td class=\"{}\">{:+}</td>", delta_class(row.contributors_delta_window), row.contributors_delta_window)?;
            writeln!(out, "                    <td>{}</td>", row.stars_total)?;
            writeln!(out, "                    <td>{}</td>", row.forks_total)?;
            writeln!(out, "                    <td class=\"{}\">{}</td>", delta_class(row.delta_score), row.delta_score)?;
            writeln!(out, "                    <td>{}</td>", escape(&row.last_activity_date))?;
            writeln!(out, "                </tr>")?;
        }
        writeln!(out, "            </tbody>")?;
        writeln!(out, "        </table>")?;
    }

    if !p.user_event_rows.is_empty() {
        writeln!(out, "        <h2>Events and Contributors</h2>")?;
        writeln!(out, "        <table>")?;
        writeln!(out, "            <thead>")?;
        writeln!(out, "                <tr><th>Repository</th><th>Events (prev &rarr; curr)</th><th>Contributors (prev &rarr; curr)</th></tr>")?;
        writeln!(out, "            </thead>")?;
        writeln!(out, "            <tbody>")?;
        for row in &p.user_event_rows {
            writeln!(
                out,
                "                <tr><td>{}</td><td>{} &rarr; {} <span class=\"{}\">({:+})</span></td><td>{} &rarr; {} <span class=\"{}\">({:+})</span></td></tr>",
                escape(&row.repo_name),
                row.prev_event_count,
                row.curr_event_count,
                delta_class(row.event_delta),
                row.event_delta,
                row.prev_contributor_count,
                row.curr_contributor_count,
                delta_class(row.contributor_delta),
                row.contributor_delta
            )?;
        }
        writeln!(out, "            </tbody>")?;
        writeln!(out, "        </table>")?;
    }

    if p.include_network {
        writeln!(out, "        <h2>Contributor Network</h2>")?;
        write_notice(out, "error", p.edge_error.as_deref())?;

        if !p.degree_rows.is_empty() {
            writeln!(out, "        <table>")?;
            writeln!(out, "            <thead><tr><th>Repository</th><th>Weighted Degree</th></tr></thead>")?;
            writeln!(out, "            <tbody>")?;
            for row in &p.degree_rows {
                writeln!(out, "                <tr><td>{}</td><td>{}</td></tr>", escape(&row.repo_name), row.degree)?;
            }
            writeln!(out, "            </tbody>")?;
            writeln!(out, "        </table>")?;
        }

        if p.edge_rows.is_empty() && p.edge_error.is_none() {
            writeln!(out, "        <p>No shared contributors in this window.</p>")?;
        } else if !p.edge_rows.is_empty() {
            writeln!(out, "        <table>")?;
            writeln!(out, "            <thead><tr><th>Source</th><th>Target</th><th>Shared Contributors</th></tr></thead>")?;
            writeln!(out, "            <tbody>")?;
            for edge in &p.edge_rows {
                writeln!(
                    out,
                    "                <tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                    escape(&edge.source_repo),
                    escape(&edge.target_repo),
                    edge.shared_contributor_count
                )?;
            }
            writeln!(out, "            </tbody>")?;
            writeln!(out, "        </table>")?;
        }
    }

    writeln!(out, "    </div>")?;
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")?;
    Ok(())
}

fn write_notice(out: &mut String, kind: &str, message: Option<&str>) -> fmt::Result {
    if let Some(message) = message {
        writeln!(out, "        <div class=\"notice {kind}\">{}</div>", escape(message))?;
    }
    Ok(())
}
