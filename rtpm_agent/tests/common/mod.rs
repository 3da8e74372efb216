//! Scripted host and transport used by the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rtpm_agent::host::{HostProbe, MemoryReading, ProcessEntry};
use rtpm_agent::transport::{Transport, TransportError};
use serde_json::Value;

pub const MB: u64 = 1024 * 1024;

/// Host whose CPU readings come from a script, one value per sample.
pub struct FakeHost {
    script: VecDeque<Option<f32>>,
    idle: Option<f32>,
    current: Option<f32>,
    refreshes: usize,
    pub memory: Option<MemoryReading>,
    pub processes: Vec<ProcessEntry>,
    pub process_cpu: HashMap<u32, f32>,
    /// Pids that exit between enumeration and the measured read.
    pub exit_on_refresh: HashSet<u32>,
    alive: HashSet<u32>,
    pub cores: usize,
}

impl FakeHost {
    pub fn new(cpu: &[f32]) -> Self {
        Self {
            script: cpu.iter().map(|&v| Some(v)).collect(),
            idle: Some(1.0),
            current: None,
            refreshes: 0,
            memory: Some(MemoryReading {
                available: 4096 * MB,
                total: 8192 * MB,
            }),
            processes: Vec::new(),
            process_cpu: HashMap::new(),
            exit_on_refresh: HashSet::new(),
            alive: HashSet::new(),
            cores: 1,
        }
    }

    /// No CPU counter at all.
    pub fn without_cpu_counter() -> Self {
        let mut h = Self::new(&[]);
        h.idle = None;
        h
    }

    pub fn with_available_mb(mut self, mb: u64) -> Self {
        self.memory = Some(MemoryReading {
            available: mb * MB,
            total: 8192 * MB,
        });
        self
    }

    pub fn with_process(mut self, pid: u32, name: &str, raw_cpu: f32) -> Self {
        self.processes.push(ProcessEntry {
            pid,
            name: name.to_string(),
        });
        self.process_cpu.insert(pid, raw_cpu);
        self
    }

    pub fn with_cores(mut self, cores: usize) -> Self {
        self.cores = cores;
        self
    }

    pub fn exiting(mut self, pid: u32) -> Self {
        self.exit_on_refresh.insert(pid);
        self
    }
}

impl HostProbe for FakeHost {
    fn refresh_cpu(&mut self) {
        self.refreshes += 1;
        // Every second refresh is the measured read of a sample.
        if self.refreshes % 2 == 0 {
            self.current = self.script.pop_front().unwrap_or(self.idle);
        }
    }

    fn cpu_usage(&self) -> Option<f32> {
        self.current
    }

    fn memory(&mut self) -> Option<MemoryReading> {
        self.memory
    }

    fn enumerate_processes(&mut self) -> Vec<ProcessEntry> {
        self.alive = self.processes.iter().map(|p| p.pid).collect();
        self.processes.clone()
    }

    fn refresh_processes(&mut self) {
        for pid in &self.exit_on_refresh {
            self.alive.remove(pid);
        }
    }

    fn process_cpu(&self, pid: u32) -> Option<f32> {
        if !self.alive.contains(&pid) {
            return None;
        }
        self.process_cpu.get(&pid).copied()
    }

    fn logical_cpus(&self) -> usize {
        self.cores
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Ack,
    Fail,
    Never,
}

/// Transport that records every payload and answers according to `mode`.
#[derive(Clone)]
pub struct FakeTransport {
    pub mode: AckMode,
    pub published: Arc<Mutex<Vec<(String, Value)>>>,
    pub disconnected: Arc<AtomicBool>,
}

impl FakeTransport {
    pub fn new(mode: AckMode) -> Self {
        Self {
            mode,
            published: Arc::new(Mutex::new(Vec::new())),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.published.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.published()
            .iter()
            .map(|(_, v)| v["AlertType"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn publish(&mut self, channel: &str, message: Value) -> Result<(), TransportError> {
        self.published
            .lock()
            .unwrap()
            .push((channel.to_string(), message));
        match self.mode {
            AckMode::Ack => Ok(()),
            AckMode::Fail => Err(TransportError::Rejected("quota exceeded".into())),
            AckMode::Never => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
