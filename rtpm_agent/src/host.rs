//! Host probe: the process table and CPU/memory counters, behind a trait so the
//! sampler and ranker can be driven by fakes in tests.

use sysinfo::{
    CpuRefreshKind, MemoryRefreshKind, Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind,
    System,
};
use tracing::warn;

/// A process seen at enumeration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Memory figures in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryReading {
    pub available: u64,
    pub total: u64,
}

/// Everything the monitor reads from the host. Every read may fail individually;
/// failures are reported as `None`, never as panics or errors.
///
/// CPU counters are cumulative: a value is only meaningful after two refreshes
/// separated by a settle interval.
pub trait HostProbe: Send {
    /// Advance the host-wide CPU counter.
    fn refresh_cpu(&mut self);
    /// Host-wide CPU% since the previous refresh, or `None` if there is no counter.
    fn cpu_usage(&self) -> Option<f32>;
    fn memory(&mut self) -> Option<MemoryReading>;
    /// List live processes and prime their per-process CPU counters.
    fn enumerate_processes(&mut self) -> Vec<ProcessEntry>;
    /// Advance per-process CPU counters, dropping processes that exited.
    fn refresh_processes(&mut self);
    /// Raw (not core-normalized) CPU% of `pid`, `None` if it is gone.
    fn process_cpu(&self, pid: u32) -> Option<f32>;
    fn logical_cpus(&self) -> usize;
}

/// `HostProbe` backed by a persistent sysinfo `System`.
pub struct SysinfoHost {
    sys: System,
}

impl SysinfoHost {
    pub fn new() -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
            .with_memory(MemoryRefreshKind::nothing().with_ram());
        Self {
            sys: System::new_with_specifics(refresh_kind),
        }
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostProbe for SysinfoHost {
    fn refresh_cpu(&mut self) {
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.sys.refresh_cpu_usage();
        })) {
            warn!("sysinfo cpu refresh panicked: {e:?}");
        }
    }

    fn cpu_usage(&self) -> Option<f32> {
        if self.sys.cpus().is_empty() {
            return None;
        }
        let v = self.sys.global_cpu_usage();
        v.is_finite().then_some(v)
    }

    fn memory(&mut self) -> Option<MemoryReading> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return None;
        }
        Some(MemoryReading {
            available: self.sys.available_memory(),
            total,
        })
    }

    fn enumerate_processes(&mut self) -> Vec<ProcessEntry> {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
        let mut list: Vec<ProcessEntry> = self
            .sys
            .processes()
            .values()
            .map(|p| ProcessEntry {
                pid: p.pid().as_u32(),
                name: p.name().to_string_lossy().into_owned(),
            })
            .collect();
        // sysinfo hands out a HashMap; pid order keeps enumeration deterministic.
        list.sort_by_key(|p| p.pid);
        list
    }

    fn refresh_processes(&mut self) {
        self.sys.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_cpu(),
        );
    }

    fn process_cpu(&self, pid: u32) -> Option<f32> {
        self.sys.process(Pid::from_u32(pid)).map(|p| p.cpu_usage())
    }

    fn logical_cpus(&self) -> usize {
        self.sys.cpus().len().max(1)
    }
}
