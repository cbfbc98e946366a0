//! Formatting helpers shared by the library and the CLI.

use chrono::Duration;

/// Format a duration as `H:MM:SS`. Negative durations clamp to zero.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Format an optional duration, or a dash if missing.
pub fn format_duration_opt(duration: Option<Duration>) -> String {
    match duration {
        Some(d) => format_duration(d),
        None => "-".to_string(),
    }
}

/// Format a performance ratio as a percentage, or a dash if undefined.
pub fn format_performance(ratio: Option<f64>) -> String {
    match ratio {
        Some(r) => format!("{:.1}%", r * 100.0),
        None => "-".to_string(),
    }
}
