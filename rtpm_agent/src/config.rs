//! Agent configuration from argv (and a few env fallbacks).
//!
//! Positional arguments keep the classic order `MaxCPUUsage MinRAMAvailable Period`.
//! A value that does not parse is reported and replaced by its default; bad
//! configuration never prevents startup.

use thiserror::Error;
use tokio::time::Duration;
use url::Url;

use crate::detector::{DEFAULT_MAX_CPU_USAGE, DEFAULT_PERIOD};
use crate::monitor::MonitorSettings;
use crate::publisher::DEFAULT_ACK_TIMEOUT;
use crate::report::{MemoryThreshold, DEFAULT_MIN_RAM_AVAILABLE};
use crate::sampler::DEFAULT_SETTLE;
use crate::types::RamUnit;

pub const DEFAULT_HUB_URL: &str = "ws://127.0.0.1:3000/ws";
pub const DEFAULT_CHANNEL: &str = "PNRTPM";

pub const USAGE: &str = "Usage: rtpm_agent [MaxCPUUsage [MinRAMAvailable [Period]]] \
[--hub URL|-u URL] [--channel NAME|-c NAME] [--server-name NAME] [--ram-unit mb|percent] [--top N]";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to convert {name}: '{value}', using default {default}")]
    InvalidNumber {
        name: &'static str,
        value: String,
        default: String,
    },
    #[error("unknown RAM unit '{0}', using MB")]
    InvalidRamUnit(String),
    #[error("invalid hub url '{0}', using the default hub")]
    InvalidUrl(String),
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error("ignoring unexpected argument '{0}'")]
    Unexpected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub max_cpu_usage: u32,
    pub min_ram_available: u64,
    pub ram_unit: RamUnit,
    pub period: u32,
    pub hub_url: String,
    pub channel: String,
    pub server_name: String,
    pub settle: Duration,
    pub ack_timeout: Duration,
    pub top_k: Option<usize>,
    /// Problems found while parsing; each one already fell back to a default.
    pub warnings: Vec<ConfigError>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_cpu_usage: DEFAULT_MAX_CPU_USAGE,
            min_ram_available: DEFAULT_MIN_RAM_AVAILABLE,
            ram_unit: RamUnit::Megabytes,
            period: DEFAULT_PERIOD,
            hub_url: DEFAULT_HUB_URL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            server_name: default_server_name(),
            settle: DEFAULT_SETTLE,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            top_k: None,
            warnings: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            server_name: self.server_name.clone(),
            max_cpu_usage: self.max_cpu_usage,
            period: self.period,
            memory: MemoryThreshold::new(self.min_ram_available, self.ram_unit),
            settle: self.settle,
            top_k: self.top_k,
        }
    }
}

#[derive(Debug)]
pub enum ParsedArgs {
    Run(AgentConfig),
    Help(String),
}

pub fn default_server_name() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".into())
}

fn parse_num<N: std::str::FromStr + ToString>(
    name: &'static str,
    raw: &str,
    default: N,
    warnings: &mut Vec<ConfigError>,
) -> N {
    match raw.trim().parse::<N>() {
        Ok(v) => v,
        Err(_) => {
            warnings.push(ConfigError::InvalidNumber {
                name,
                value: raw.to_string(),
                default: default.to_string(),
            });
            default
        }
    }
}

fn parse_millis(
    name: &'static str,
    raw: Option<String>,
    default: Duration,
    warnings: &mut Vec<ConfigError>,
) -> Duration {
    match raw {
        Some(v) => Duration::from_millis(parse_num(
            name,
            &v,
            default.as_millis() as u64,
            warnings,
        )),
        None => default,
    }
}

/// Parse `args` (program name first) using the process environment for fallbacks.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> ParsedArgs {
    parse_args_with_env(args, |k| std::env::var(k).ok())
}

pub fn parse_args_with_env<I, E>(args: I, env: E) -> ParsedArgs
where
    I: IntoIterator<Item = String>,
    E: Fn(&str) -> Option<String>,
{
    let mut it = args.into_iter();
    let _ = it.next(); // program name
    let mut cfg = AgentConfig::default();
    let mut warnings = Vec::new();

    let mut positional: Vec<String> = Vec::new();
    let mut hub: Option<String> = None;
    let mut channel: Option<String> = None;
    let mut ram_unit: Option<String> = None;
    let mut top: Option<String> = None;

    while let Some(arg) = it.next() {
        // `--flag=value` and `--flag value` are equivalent.
        let (flag, inline) = match arg.split_once('=') {
            Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &'static str| -> Option<String> {
            let v = inline.clone().or_else(|| it.next());
            if v.is_none() {
                warnings.push(ConfigError::MissingValue(name));
            }
            v
        };
        match flag.as_str() {
            "-h" | "--help" => return ParsedArgs::Help(USAGE.to_string()),
            "--hub" | "-u" => hub = value("--hub"),
            "--channel" | "-c" => channel = value("--channel"),
            "--server-name" => {
                if let Some(v) = value("--server-name").filter(|v| !v.trim().is_empty()) {
                    cfg.server_name = v;
                }
            }
            "--ram-unit" => ram_unit = value("--ram-unit"),
            "--top" => top = value("--top"),
            _ if arg.starts_with('-') && arg.parse::<i64>().is_err() => {
                warnings.push(ConfigError::Unexpected(arg));
            }
            _ => positional.push(arg),
        }
    }

    if let Some(raw) = positional.first() {
        cfg.max_cpu_usage = parse_num("MaxCPUUsage", raw, DEFAULT_MAX_CPU_USAGE, &mut warnings);
    }
    if let Some(raw) = positional.get(1) {
        cfg.min_ram_available =
            parse_num("MinRAMAvailable", raw, DEFAULT_MIN_RAM_AVAILABLE, &mut warnings);
    }
    if let Some(raw) = positional.get(2) {
        cfg.period = parse_num("Period", raw, DEFAULT_PERIOD, &mut warnings);
    }
    for extra in positional.iter().skip(3) {
        warnings.push(ConfigError::Unexpected(extra.clone()));
    }

    if let Some(raw) = ram_unit.or_else(|| env("RTPM_RAM_UNIT")) {
        match RamUnit::parse(&raw) {
            Some(u) => cfg.ram_unit = u,
            None => warnings.push(ConfigError::InvalidRamUnit(raw)),
        }
    }
    if let Some(raw) = hub.or_else(|| env("RTPM_HUB_URL")) {
        match Url::parse(&raw) {
            Ok(u) if matches!(u.scheme(), "ws" | "wss") => cfg.hub_url = raw,
            _ => warnings.push(ConfigError::InvalidUrl(raw)),
        }
    }
    if let Some(ch) = channel
        .or_else(|| env("RTPM_CHANNEL"))
        .filter(|c| !c.trim().is_empty())
    {
        cfg.channel = ch;
    }
    if let Some(raw) = top {
        let k = parse_num("--top", &raw, usize::MAX, &mut warnings);
        cfg.top_k = (k != usize::MAX).then_some(k);
    }
    cfg.settle = parse_millis(
        "RTPM_SETTLE_MS",
        env("RTPM_SETTLE_MS"),
        DEFAULT_SETTLE,
        &mut warnings,
    );
    cfg.ack_timeout = parse_millis(
        "RTPM_ACK_TIMEOUT_MS",
        env("RTPM_ACK_TIMEOUT_MS"),
        DEFAULT_ACK_TIMEOUT,
        &mut warnings,
    );

    cfg.warnings = warnings;
    ParsedArgs::Run(cfg)
}
