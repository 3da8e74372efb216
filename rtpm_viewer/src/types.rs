//! Types that mirror the agent's JSON schema and the hub's frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProcessInfo {
    #[serde(rename = "ProcessName")]
    pub name: String,
    #[serde(rename = "Id")]
    pub pid: u32,
    #[serde(rename = "CPUUsage", default)]
    pub cpu_usage: f32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct UsageReport {
    #[serde(rename = "ServerName")]
    pub server_name: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "CPUUsage", default)]
    pub cpu_usage: f32,
    #[serde(rename = "RAMAvailable", default)]
    pub ram_available: u64,
    #[serde(rename = "Processes", default)]
    pub processes: Vec<ProcessInfo>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LowMemoryAlert {
    #[serde(rename = "ServerName")]
    pub server_name: String,
    #[serde(rename = "Date")]
    pub date: DateTime<Utc>,
    #[serde(rename = "RAMAvailable", default)]
    pub ram_available: u64,
    #[serde(rename = "Threshold", default)]
    pub threshold: u64,
    #[serde(rename = "Unit", default)]
    pub unit: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "AlertType")]
pub enum Report {
    #[serde(rename = "PROCESS_ALERT")]
    Usage(UsageReport),
    #[serde(rename = "RAM_ALERT")]
    LowMemory(LowMemoryAlert),
}

impl Report {
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Report::Usage(r) => r.date,
            Report::LowMemory(r) => r.date,
        }
    }

    pub fn server_name(&self) -> &str {
        match self {
            Report::Usage(r) => &r.server_name,
            Report::LowMemory(r) => &r.server_name,
        }
    }
}

/// The subset of hub frames a subscriber sends or receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Subscribe {
        channel: String,
    },
    Unsubscribe {
        channel: String,
    },
    Subscribed {
        channel: String,
    },
    Unsubscribed {
        channel: String,
    },
    Ack {
        seq: u64,
    },
    Error {
        #[serde(default)]
        seq: Option<u64>,
        message: String,
    },
    Message {
        channel: String,
        message: Value,
    },
}
