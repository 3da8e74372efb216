//! Host-wide CPU and memory sampling. One `sample` call is one baseline read,
//! one settle interval, and one measured read.

use chrono::Utc;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::host::{HostProbe, MemoryReading};
use crate::types::Sample;

/// Pause between the discard read and the measured read of a CPU counter.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct MetricSampler {
    settle: Duration,
}

impl MetricSampler {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Never fails: a missing counter yields `Sample::unavailable`.
    pub async fn sample<H: HostProbe + ?Sized>(&self, host: &mut H) -> Sample {
        host.refresh_cpu();
        sleep(self.settle).await;
        host.refresh_cpu();
        let now = Utc::now();
        match host.cpu_usage() {
            Some(v) => Sample::new(v.clamp(0.0, 100.0), now),
            None => {
                debug!("cpu counter unavailable, treating tick as below threshold");
                Sample::unavailable(now)
            }
        }
    }

    pub fn memory<H: HostProbe + ?Sized>(&self, host: &mut H) -> Option<MemoryReading> {
        let m = host.memory();
        if m.is_none() {
            debug!("memory counter unavailable");
        }
        m
    }
}

impl Default for MetricSampler {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE)
    }
}
