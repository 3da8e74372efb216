//! Received report rows. The table only grows: every report ever received stays.

use chrono::{DateTime, Local};

use crate::types::Report;

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub reported_at: DateTime<Local>,
    pub server: String,
    /// `None` for low-memory alerts, which carry no CPU reading.
    pub cpu: Option<f32>,
    pub ram_mb: u64,
    pub alert: &'static str,
}

impl Row {
    pub fn from_report(r: &Report) -> Self {
        let (cpu, ram_mb, alert) = match r {
            Report::Usage(u) => (Some(u.cpu_usage), u.ram_available, "CPU"),
            Report::LowMemory(m) => (None, m.ram_available, "RAM"),
        };
        Self {
            reported_at: r.date().with_timezone(&Local),
            server: r.server_name().to_string(),
            cpu,
            ram_mb,
            alert,
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    rows: Vec<Row>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, r: &Report) -> &Row {
        self.rows.push(Row::from_report(r));
        &self.rows[self.rows.len() - 1]
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LowMemoryAlert, ProcessInfo, UsageReport};
    use chrono::{TimeZone, Utc};

    fn usage(server: &str, cpu: f32) -> Report {
        Report::Usage(UsageReport {
            server_name: server.into(),
            date: Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap(),
            cpu_usage: cpu,
            ram_available: 900,
            processes: vec![ProcessInfo {
                name: "busy".into(),
                pid: 7,
                cpu_usage: cpu,
            }],
        })
    }

    #[test]
    fn usage_report_row_carries_cpu_in_local_time() {
        let r = usage("web-01", 91.5);
        let row = Row::from_report(&r);
        assert_eq!(row.alert, "CPU");
        assert_eq!(row.cpu, Some(91.5));
        assert_eq!(row.ram_mb, 900);
        assert_eq!(row.reported_at, r.date().with_timezone(&Local));
    }

    #[test]
    fn low_memory_row_has_no_cpu() {
        let r = Report::LowMemory(LowMemoryAlert {
            server_name: "db".into(),
            date: Utc::now(),
            ram_available: 8,
            threshold: 10,
            unit: "MB".into(),
            message: "RAM Alert! Less than 10 MB available".into(),
        });
        let row = Row::from_report(&r);
        assert_eq!(row.alert, "RAM");
        assert_eq!(row.cpu, None);
        assert_eq!(row.ram_mb, 8);
    }

    #[test]
    fn history_keeps_every_row_in_arrival_order() {
        let mut h = History::new();
        assert!(h.is_empty());
        for i in 0..500 {
            h.push(&usage(&format!("srv-{i}"), 60.0));
        }
        assert_eq!(h.len(), 500);
        assert_eq!(h.rows()[0].server, "srv-0");
        assert_eq!(h.rows()[499].server, "srv-499");
    }
}
