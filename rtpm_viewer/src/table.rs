//! Plain-text rendering of report rows.

use crate::history::Row;
use crate::types::ProcessInfo;

pub fn header() -> String {
    format!(
        "{:<20} {:<20} {:<5} {:>8} {:>9}",
        "DATE", "SERVER", "ALERT", "CPU", "RAM"
    )
}

fn fmt_cpu(v: Option<f32>) -> String {
    match v {
        Some(v) => format!("{:>6.2} %", v.clamp(0.0, 100.0)),
        None => format!("{:>8}", "-"),
    }
}

pub fn truncate_middle(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max <= 3 {
        return "...".into();
    }
    let keep = max - 3;
    let left = keep / 2;
    let right = keep - left;
    let head: String = s.chars().take(left).collect();
    let tail: String = s
        .chars()
        .rev()
        .take(right)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}...{tail}")
}

pub fn format_row(r: &Row) -> String {
    format!(
        "{:<20} {:<20} {:<5} {} {:>6} Mb",
        r.reported_at.format("%Y-%m-%d %H:%M:%S"),
        truncate_middle(&r.server, 20),
        r.alert,
        fmt_cpu(r.cpu),
        r.ram_mb
    )
}

/// Indented lines for the `limit` busiest processes (already ranked by the agent).
pub fn format_processes(procs: &[ProcessInfo], limit: usize) -> Vec<String> {
    procs
        .iter()
        .take(limit)
        .map(|p| {
            format!(
                "    {:>8}  {:<32} {}",
                p.pid,
                truncate_middle(&p.name, 32),
                fmt_cpu(Some(p.cpu_usage))
            )
        })
        .collect()
}
