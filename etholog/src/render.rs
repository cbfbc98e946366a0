//! Plain-text rendering of tables and summaries.

use etholog_core::analytics::{SessionPerformance, SessionSummary};
use etholog_core::db::Value;
use etholog_core::format::format_performance;
use etholog_core::Table;

/// Render one cell
fn cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => format!("{:.3}", f),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Render a table with left-aligned, space-padded columns.
pub fn render_table(table: &Table) -> String {
    let cells: Vec<Vec<String>> = table
        .rows()
        .iter()
        .map(|row| row.iter().map(cell).collect())
        .collect();

    let widths: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(table.columns().iter().map(String::as_str).collect()));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in &cells {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out.push_str(&format!("({} rows)\n", table.len()));
    out
}

/// Multi-line overview of one session
pub fn render_summary(summary: &SessionSummary) -> String {
    let s = &summary.session;
    let mut out = String::new();
    out.push_str(&format!("Animal {}  Session {}\n", s.animal_id, s.session));
    out.push_str(&format!(
        "   Started:     {}\n",
        s.session_tmst.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("   Setup:       {}\n", s.setup));
    out.push_str(&format!("   User:        {}\n", s.user_name));
    out.push_str(&format!("   Experiment:  {}\n", s.experiment_type));
    for classes in &summary.classes {
        out.push_str(&format!(
            "   Classes:     {} / {} / {}\n",
            classes.experiment_class, classes.behavior_class, classes.stimulus_class
        ));
    }
    out.push_str(&format!("   Duration:    {}\n", summary.duration));
    out.push_str(&format!(
        "   Trials:      {} ({} aborted)\n",
        summary.trial_count, summary.aborted_count
    ));
    out.push_str(&format!(
        "   Outcomes:    {} rewarded, {} punished, {} undecided\n",
        summary.counts.rewarded, summary.counts.punished, summary.counts.undecided
    ));
    out.push_str(&format!(
        "   Performance: {}\n",
        format_performance(summary.performance)
    ));
    out.push_str(&format!("   Licks:       {}\n", summary.lick_count));
    out
}

/// One line per session for a performance series
pub fn render_performance(series: &[SessionPerformance]) -> String {
    let mut out = String::new();
    out.push_str("session  started              trials  decisive  performance\n");
    for point in series {
        out.push_str(&format!(
            "{:<7}  {:<19}  {:<6}  {:<8}  {}\n",
            point.session,
            point.session_tmst.format("%Y-%m-%d %H:%M:%S"),
            point.trials,
            point.counts.decisive(),
            format_performance(point.performance)
        ));
    }
    out
}
