//! Data types published on the channel.
//! Keep this module minimal and stable; it defines the wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One CPU reading taken per tick. `cpu == None` means the host counter was unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub cpu: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(cpu: f32, timestamp: DateTime<Utc>) -> Self {
        Self {
            cpu: Some(cpu),
            timestamp,
        }
    }

    pub fn unavailable(timestamp: DateTime<Utc>) -> Self {
        Self {
            cpu: None,
            timestamp,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.cpu.is_none()
    }

    /// Unavailable samples never count as a breach.
    pub fn breaches(&self, threshold: f32) -> bool {
        matches!(self.cpu, Some(v) if v >= threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    #[serde(rename = "ProcessName")]
    pub process_name: String,
    #[serde(rename = "Id")]
    pub pid: u32,
    #[serde(rename = "CPUUsage")]
    pub cpu_usage: f32,
}

/// Unit the low-memory threshold is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RamUnit {
    #[default]
    #[serde(rename = "MB")]
    Megabytes,
    #[serde(rename = "%")]
    Percent,
}

impl RamUnit {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mb" | "mbytes" | "megabytes" => Some(Self::Megabytes),
            "%" | "pct" | "percent" => Some(Self::Percent),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Self::Megabytes => "MB",
            Self::Percent => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageReport {
    #[serde(rename = "ServerName")]
    pub server_name: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "CPUUsage")]
    pub cpu_usage: f32,
    /// Available memory in MB at the time of the breach.
    #[serde(rename = "RAMAvailable")]
    pub ram_available: u64,
    #[serde(rename = "Processes")]
    pub processes: Vec<ProcessSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowMemoryAlert {
    #[serde(rename = "ServerName")]
    pub server_name: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "RAMAvailable")]
    pub ram_available: u64,
    #[serde(rename = "Threshold")]
    pub threshold: u64,
    #[serde(rename = "Unit")]
    pub unit: RamUnit,
    #[serde(rename = "Message")]
    pub message: String,
}

/// A message published on the channel; `AlertType` carries the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "AlertType")]
pub enum Report {
    #[serde(rename = "PROCESS_ALERT")]
    Usage(UsageReport),
    #[serde(rename = "RAM_ALERT")]
    LowMemory(LowMemoryAlert),
}

impl Report {
    pub fn kind(&self) -> &'static str {
        match self {
            Report::Usage(_) => "PROCESS_ALERT",
            Report::LowMemory(_) => "RAM_ALERT",
        }
    }

    pub fn server_name(&self) -> &str {
        match self {
            Report::Usage(r) => &r.server_name,
            Report::LowMemory(r) => &r.server_name,
        }
    }
}
