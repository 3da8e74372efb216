//! Report construction. Pure functions: no I/O, no clock reads.

use chrono::{DateTime, Utc};

use crate::host::MemoryReading;
use crate::types::{LowMemoryAlert, ProcessSnapshot, RamUnit, Report, Sample, UsageReport};

pub const DEFAULT_MIN_RAM_AVAILABLE: u64 = 10;

const MB: u64 = 1024 * 1024;

/// Low-memory threshold: alert when available memory is at or below `value` `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryThreshold {
    pub value: u64,
    pub unit: RamUnit,
}

impl MemoryThreshold {
    pub fn new(value: u64, unit: RamUnit) -> Self {
        Self { value, unit }
    }

    /// Available memory expressed in this threshold's unit.
    pub fn measure(&self, m: &MemoryReading) -> u64 {
        match self.unit {
            RamUnit::Megabytes => m.available / MB,
            RamUnit::Percent => {
                if m.total == 0 {
                    0
                } else {
                    ((m.available as u128 * 100) / m.total as u128) as u64
                }
            }
        }
    }

    /// No debounce: every tick under the threshold alerts. Unreadable memory never does.
    pub fn is_low(&self, m: Option<&MemoryReading>) -> bool {
        m.is_some_and(|m| self.measure(m) <= self.value)
    }
}

impl Default for MemoryThreshold {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RAM_AVAILABLE, RamUnit::Megabytes)
    }
}

pub fn available_mb(m: Option<&MemoryReading>) -> u64 {
    m.map(|m| m.available / MB).unwrap_or(0)
}

pub fn usage_report(
    server_name: &str,
    sample: &Sample,
    memory: Option<&MemoryReading>,
    processes: Vec<ProcessSnapshot>,
) -> Report {
    Report::Usage(UsageReport {
        server_name: server_name.to_string(),
        date: sample.timestamp,
        cpu_usage: sample.cpu.unwrap_or(0.0),
        ram_available: available_mb(memory),
        processes,
    })
}

pub fn low_memory_alert(
    server_name: &str,
    at: DateTime<Utc>,
    threshold: MemoryThreshold,
    memory: &MemoryReading,
) -> Report {
    Report::LowMemory(LowMemoryAlert {
        server_name: server_name.to_string(),
        date: at,
        ram_available: available_mb(Some(memory)),
        threshold: threshold.value,
        unit: threshold.unit,
        message: alert_message(threshold),
    })
}

pub fn alert_message(threshold: MemoryThreshold) -> String {
    match threshold.unit {
        RamUnit::Megabytes => format!("RAM Alert! Less than {} MB available", threshold.value),
        RamUnit::Percent => format!("RAM Alert! Less than {}% available", threshold.value),
    }
}

/// Reports for one tick, usage report first.
pub fn build_tick_reports(
    server_name: &str,
    sample: &Sample,
    breach: Option<Vec<ProcessSnapshot>>,
    threshold: MemoryThreshold,
    memory: Option<&MemoryReading>,
) -> Vec<Report> {
    let mut out = Vec::with_capacity(2);
    if let Some(processes) = breach {
        out.push(usage_report(server_name, sample, memory, processes));
    }
    if let Some(m) = memory.filter(|m| threshold.is_low(Some(m))) {
        out.push(low_memory_alert(server_name, sample.timestamp, threshold, m));
    }
    out
}
