//! Shared hub state: one broadcast sender per channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

/// Messages buffered per channel for slow subscribers before they start lagging.
pub const CHANNEL_CAPACITY: usize = 256;

pub type SharedChannels = Arc<Mutex<HashMap<String, broadcast::Sender<Value>>>>;

#[derive(Clone, Default)]
pub struct HubState {
    pub channels: SharedChannels,
    pub client_count: Arc<AtomicUsize>,
}

impl HubState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for `name`, created on first use.
    pub async fn channel(&self, name: &str) -> broadcast::Sender<Value> {
        let mut map = self.channels.lock().await;
        map.entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Open WebSocket connections.
    pub fn clients(&self) -> usize {
        self.client_count.load(Ordering::Relaxed)
    }

    pub async fn subscriber_count(&self, name: &str) -> usize {
        self.channels
            .lock()
            .await
            .get(name)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}
