//! rtpm_hub: minimal WebSocket pub/sub relay the agent publishes to and viewers subscribe to.

use std::env;
use std::net::SocketAddr;

use tracing::info;

use rtpm_agent::logging::init_tracing;
use rtpm_agent::state::HubState;
use rtpm_agent::ws::router;

const DEFAULT_PORT: u16 = 3000;

fn parse_port<I: IntoIterator<Item = String>>(args: I, default_port: u16) -> Result<u16, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "rtpm_hub".into());
    let mut long: Option<String> = None;
    let mut short: Option<String> = None;
    while let Some(a) = it.next() {
        match a.as_str() {
            "-h" | "--help" => return Err(format!("Usage: {prog} [--port PORT|-p PORT]")),
            "--port" => long = it.next(),
            "-p" => short = it.next(),
            _ if a.starts_with("--port=") => {
                if let Some((_, v)) = a.split_once('=') {
                    long = Some(v.to_string());
                }
            }
            _ => {}
        }
    }
    Ok(long
        .or(short)
        .or_else(|| env::var("RTPM_HUB_PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(default_port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let port = match parse_port(env::args(), DEFAULT_PORT) {
        Ok(p) => p,
        Err(usage) => {
            eprintln!("{usage}");
            return Ok(());
        }
    };
    init_tracing("info");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("rtpm hub listening on ws://{}/ws", listener.local_addr()?);

    axum::serve(listener, router(HubState::new()))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("rtpm hub stopped");
    Ok(())
}
