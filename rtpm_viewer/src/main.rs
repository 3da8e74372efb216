//! Entry point for the rtpm viewer. Subscribes to a channel and prints every report.

use std::env;

use anyhow::Context;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

use rtpm_viewer::history::History;
use rtpm_viewer::table::{format_processes, format_row, header};
use rtpm_viewer::types::Report;
use rtpm_viewer::ws::{connect, next_report, subscribe, unsubscribe, Incoming};

const DEFAULT_URL: &str = "ws://127.0.0.1:3000/ws";
const DEFAULT_CHANNEL: &str = "PNRTPM";
const DEFAULT_LIMIT: usize = 5;
const CONFIRM_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct ParsedArgs {
    url: String,
    channel: String,
    limit: usize,
}

fn usage(prog: &str) -> String {
    format!("Usage: {prog} [--channel NAME|-c NAME] [--limit N] [ws://HOST:PORT/ws]")
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<ParsedArgs, String> {
    let mut it = args.into_iter();
    let prog = it.next().unwrap_or_else(|| "rtpm_viewer".into());
    let mut url: Option<String> = None;
    let mut channel = env::var("RTPM_CHANNEL").unwrap_or_else(|_| DEFAULT_CHANNEL.into());
    let mut limit = DEFAULT_LIMIT;

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => return Err(usage(&prog)),
            "--channel" | "-c" => {
                channel = it.next().ok_or_else(|| usage(&prog))?;
            }
            "--limit" => {
                let v = it.next().ok_or_else(|| usage(&prog))?;
                limit = v
                    .parse()
                    .map_err(|_| format!("invalid --limit '{v}'. {}", usage(&prog)))?;
            }
            _ if arg.starts_with("--channel=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    if !v.is_empty() {
                        channel = v.to_string();
                    }
                }
            }
            _ if arg.starts_with("--limit=") => {
                if let Some((_, v)) = arg.split_once('=') {
                    limit = v
                        .parse()
                        .map_err(|_| format!("invalid --limit '{v}'. {}", usage(&prog)))?;
                }
            }
            _ => {
                if url.is_none() {
                    url = Some(arg);
                } else {
                    return Err(format!("Unexpected argument. {}", usage(&prog)));
                }
            }
        }
    }
    let url = url
        .or_else(|| env::var("RTPM_HUB_URL").ok())
        .unwrap_or_else(|| DEFAULT_URL.into());
    match Url::parse(&url) {
        Ok(u) if matches!(u.scheme(), "ws" | "wss") => {}
        Ok(u) => return Err(format!("unsupported scheme '{}' in {url}", u.scheme())),
        Err(e) => return Err(format!("invalid hub url '{url}': {e}. {}", usage(&prog))),
    }
    Ok(ParsedArgs {
        url,
        channel,
        limit,
    })
}

fn print_report(history: &mut History, report: &Report, limit: usize) {
    let row = history.push(report);
    println!("{}", format_row(row));
    match report {
        Report::Usage(u) => {
            for line in format_processes(&u.processes, limit) {
                println!("{line}");
            }
        }
        Report::LowMemory(m) => println!("    {}", m.message),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let parsed = match parse_args(env::args()) {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            if msg.starts_with("Usage:") {
                return Ok(());
            }
            std::process::exit(2);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let mut ws = connect(&parsed.url, CONFIRM_WAIT)
        .await
        .with_context(|| format!("connecting to {}", parsed.url))?;
    subscribe(&mut ws, &parsed.channel, CONFIRM_WAIT)
        .await
        .with_context(|| format!("subscribing to {}", parsed.channel))?;
    info!(channel = %parsed.channel, "subscribed");

    println!("{}", header());
    let mut history = History::new();
    loop {
        tokio::select! {
            incoming = next_report(&mut ws, &parsed.channel) => match incoming {
                Some(Incoming::Report(r)) => print_report(&mut history, &r, parsed.limit),
                Some(Incoming::Undecodable(raw)) => warn!("skipping unrecognized message: {raw}"),
                None => {
                    warn!("hub closed the connection");
                    return Ok(());
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!(received = history.len(), "shutting down");
    if let Err(e) = unsubscribe(&mut ws, &parsed.channel, CONFIRM_WAIT).await {
        warn!("unsubscribe failed: {e:#}");
    }
    Ok(())
}
