//! rtpm agent library: host sampling, sustained-breach detection, process ranking
//! and report publishing over a WebSocket pub/sub hub.

pub mod config;
pub mod detector;
pub mod host;
pub mod logging;
pub mod monitor;
pub mod proto;
pub mod publisher;
pub mod ranker;
pub mod report;
pub mod sampler;
pub mod state;
pub mod transport;
pub mod types;
pub mod ws;
