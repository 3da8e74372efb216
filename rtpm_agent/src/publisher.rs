//! Turns the transport's asynchronous delivery into one awaited call with a deadline.

use tokio::time::{timeout, Duration};
use tracing::{info, warn};

use crate::transport::Transport;
use crate::types::Report;

/// Fixed wait for a delivery confirmation.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub acknowledged: bool,
    pub error: Option<String>,
    pub timed_out: bool,
}

impl PublishOutcome {
    pub fn acked() -> Self {
        Self {
            acknowledged: true,
            error: None,
            timed_out: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            acknowledged: false,
            error: Some(error.into()),
            timed_out: false,
        }
    }

    pub fn timed_out(after: Duration) -> Self {
        Self {
            acknowledged: false,
            error: Some(format!("no acknowledgment within {}ms", after.as_millis())),
            timed_out: true,
        }
    }
}

pub struct ChannelPublisher<T> {
    transport: T,
    channel: String,
    ack_timeout: Duration,
}

impl<T: Transport> ChannelPublisher<T> {
    pub fn new(transport: T, channel: impl Into<String>, ack_timeout: Duration) -> Self {
        Self {
            transport,
            channel: channel.into(),
            ack_timeout,
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// `&mut self` keeps publishes strictly one at a time. Never retries.
    pub async fn publish(&mut self, report: Report) -> PublishOutcome {
        let kind = report.kind();
        let payload = match serde_json::to_value(&report) {
            Ok(v) => v,
            Err(e) => return PublishOutcome::failed(format!("encode {kind}: {e}")),
        };
        let outcome = match timeout(
            self.ack_timeout,
            self.transport.publish(&self.channel, payload),
        )
        .await
        {
            Ok(Ok(())) => PublishOutcome::acked(),
            Ok(Err(e)) => PublishOutcome::failed(e.to_string()),
            Err(_) => PublishOutcome::timed_out(self.ack_timeout),
        };
        if outcome.acknowledged {
            info!(kind, channel = %self.channel, "report published");
        } else {
            warn!(
                kind,
                channel = %self.channel,
                timed_out = outcome.timed_out,
                error = outcome.error.as_deref().unwrap_or(""),
                "report not acknowledged"
            );
        }
        outcome
    }
}
