//! The monitor loop: sample, detect, rank, report and publish, one tick at a time,
//! on a single background task until stopped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::detector::BreachDetector;
use crate::host::HostProbe;
use crate::publisher::{ChannelPublisher, PublishOutcome};
use crate::ranker::ProcessRanker;
use crate::report::{build_tick_reports, MemoryThreshold};
use crate::sampler::MetricSampler;
use crate::transport::Transport;

/// Knobs the loop needs; built from `AgentConfig`.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub server_name: String,
    pub max_cpu_usage: u32,
    pub period: u32,
    pub memory: MemoryThreshold,
    pub settle: Duration,
    pub top_k: Option<usize>,
}

pub struct MonitorLoop<H, T> {
    host: H,
    publisher: ChannelPublisher<T>,
    sampler: MetricSampler,
    ranker: ProcessRanker,
    detector: BreachDetector,
    memory: MemoryThreshold,
    server_name: String,
    stop: Arc<AtomicBool>,
    ticks: u64,
}

impl<H, T> MonitorLoop<H, T>
where
    H: HostProbe + 'static,
    T: Transport + 'static,
{
    pub fn new(settings: MonitorSettings, host: H, publisher: ChannelPublisher<T>) -> Self {
        Self {
            host,
            publisher,
            sampler: MetricSampler::new(settings.settle),
            ranker: ProcessRanker::new(settings.settle).with_top_k(settings.top_k),
            detector: BreachDetector::new(settings.max_cpu_usage, settings.period),
            memory: settings.memory,
            server_name: settings.server_name,
            stop: Arc::new(AtomicBool::new(false)),
            ticks: 0,
        }
    }

    pub fn detector(&self) -> &BreachDetector {
        &self.detector
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// One iteration. Returns the outcome of every publish attempted this tick.
    pub async fn tick(&mut self) -> Vec<PublishOutcome> {
        self.ticks += 1;
        let sample = self.sampler.sample(&mut self.host).await;
        let fired = self.detector.observe(&sample);
        debug!(
            tick = self.ticks,
            cpu = sample.cpu,
            hits = self.detector.hits(),
            "sample"
        );

        let breach = if fired {
            info!(
                cpu = sample.cpu.unwrap_or(0.0),
                period = self.detector.period(),
                "sustained cpu breach, ranking processes"
            );
            Some(self.ranker.rank(&mut self.host).await)
        } else {
            None
        };

        let memory = self.sampler.memory(&mut self.host);
        let reports = build_tick_reports(
            &self.server_name,
            &sample,
            breach,
            self.memory,
            memory.as_ref(),
        );

        let mut outcomes = Vec::with_capacity(reports.len());
        for report in reports {
            // An in-flight publish always completes; queued ones are dropped on stop.
            if self.stop_requested() {
                debug!(kind = report.kind(), "stop requested, report dropped");
                break;
            }
            outcomes.push(self.publisher.publish(report).await);
        }
        outcomes
    }

    async fn run(mut self) -> ChannelPublisher<T> {
        info!(server = %self.server_name, "monitor loop started");
        while !self.stop_requested() {
            self.tick().await;
        }
        info!(ticks = self.ticks, "monitor loop stopped");
        self.publisher
    }

    /// Spawn the loop on its own task.
    pub fn start(self) -> MonitorHandle<T> {
        let stop = self.stop.clone();
        // Worst case for one tick: two settles, a ranking settle and one ack wait.
        let grace = self.publisher.ack_timeout() + self.sampler.settle() * 3;
        MonitorHandle {
            stop,
            grace,
            task: tokio::spawn(self.run()),
        }
    }
}

pub struct MonitorHandle<T> {
    stop: Arc<AtomicBool>,
    grace: Duration,
    task: JoinHandle<ChannelPublisher<T>>,
}

impl<T: Transport + 'static> MonitorHandle<T> {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the loop to stop and wait for it. No tick starts after this call.
    /// Returns the publisher so the caller can disconnect the transport, or
    /// `None` if the loop had to be aborted.
    pub async fn stop(self) -> Option<ChannelPublisher<T>> {
        self.stop.store(true, Ordering::Release);
        let abort = self.task.abort_handle();
        match timeout(self.grace, self.task).await {
            Ok(Ok(publisher)) => Some(publisher),
            Ok(Err(e)) => {
                warn!("monitor task ended abnormally: {e}");
                None
            }
            Err(_) => {
                warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    "monitor loop did not stop in time, aborting"
                );
                abort.abort();
                None
            }
        }
    }
}
