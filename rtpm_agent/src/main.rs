//! Entry point for rtpm_agent: subscribe to the channel, run the monitor loop,
//! unsubscribe on shutdown.

use std::env;

use anyhow::Context;
use tracing::{info, warn};

use rtpm_agent::config::{parse_args, ParsedArgs};
use rtpm_agent::host::SysinfoHost;
use rtpm_agent::logging::init_tracing;
use rtpm_agent::monitor::MonitorLoop;
use rtpm_agent::publisher::ChannelPublisher;
use rtpm_agent::transport::{Transport, WsTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = match parse_args(env::args()) {
        ParsedArgs::Run(cfg) => cfg,
        ParsedArgs::Help(usage) => {
            eprintln!("{usage}");
            return Ok(());
        }
    };
    init_tracing("info");
    for w in &cfg.warnings {
        warn!("{w}");
    }
    info!(
        "MaxCPUUsage={}, MinRAMAvailable={}{}, Period={}",
        cfg.max_cpu_usage,
        cfg.min_ram_available,
        cfg.ram_unit.suffix(),
        cfg.period
    );

    // Without a subscription there is nothing to publish to: fail startup.
    let transport = WsTransport::connect(&cfg.hub_url, &cfg.channel, cfg.ack_timeout)
        .await
        .with_context(|| format!("subscribe channel {} on {}", cfg.channel, cfg.hub_url))?;

    let publisher = ChannelPublisher::new(transport, cfg.channel.clone(), cfg.ack_timeout);
    let handle = MonitorLoop::new(cfg.monitor_settings(), SysinfoHost::new(), publisher).start();

    shutdown_signal().await;
    info!("stop requested");

    if let Some(mut publisher) = handle.stop().await {
        if let Err(e) = publisher.transport_mut().disconnect().await {
            warn!("unsubscribe channel {} failed: {e}", cfg.channel);
        }
    }
    info!("rtpm_agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
