//! Process ranking taken at breach time: prime every process counter, wait one
//! settle interval, read, normalize by core count and sort descending.

use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::host::HostProbe;
use crate::sampler::DEFAULT_SETTLE;
use crate::types::ProcessSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct ProcessRanker {
    settle: Duration,
    top_k: Option<usize>,
}

impl ProcessRanker {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            top_k: None,
        }
    }

    /// Keep only the `k` busiest processes.
    pub fn with_top_k(mut self, k: Option<usize>) -> Self {
        self.top_k = k;
        self
    }

    /// A process that exits between the two reads, or whose counter cannot be
    /// read, is kept with 0% instead of failing the snapshot.
    pub async fn rank<H: HostProbe + ?Sized>(&self, host: &mut H) -> Vec<ProcessSnapshot> {
        let entries = host.enumerate_processes();
        sleep(self.settle).await;
        host.refresh_processes();

        let cores = host.logical_cpus().max(1) as f32;
        let mut missing = 0usize;
        let mut list: Vec<ProcessSnapshot> = entries
            .into_iter()
            .map(|e| {
                let cpu_usage = match host.process_cpu(e.pid) {
                    Some(raw) if raw.is_finite() => (raw / cores).clamp(0.0, 100.0),
                    _ => {
                        missing += 1;
                        0.0
                    }
                };
                ProcessSnapshot {
                    process_name: e.name,
                    pid: e.pid,
                    cpu_usage,
                }
            })
            .collect();
        if missing > 0 {
            debug!(missing, "processes without a readable cpu counter recorded as 0%");
        }

        sort_by_cpu_desc(&mut list);
        if let Some(k) = self.top_k {
            list.truncate(k);
        }
        list
    }
}

impl Default for ProcessRanker {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}

/// Stable: equal CPU keeps enumeration order.
pub fn sort_by_cpu_desc(list: &mut [ProcessSnapshot]) {
    list.sort_by(|a, b| b.cpu_usage.total_cmp(&a.cpu_usage));
}
