//! Minimal WebSocket client helpers for subscribing to a hub channel.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::types::{Frame, Report};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What arrived on the channel.
#[derive(Debug)]
pub enum Incoming {
    Report(Report),
    /// A message that is not a report (kept so callers can log it).
    Undecodable(String),
}

// Connect to the hub and return the WS stream
pub async fn connect(url: &str, wait: Duration) -> anyhow::Result<WsStream> {
    let (ws, _) = timeout(wait, connect_async(url))
        .await
        .map_err(|_| anyhow::anyhow!("timed out connecting to {url}"))??;
    Ok(ws)
}

async fn send(ws: &mut WsStream, frame: &Frame) -> anyhow::Result<()> {
    ws.send(Message::Text(serde_json::to_string(frame)?)).await?;
    Ok(())
}

async fn next_frame(ws: &mut WsStream) -> Option<Frame> {
    loop {
        match ws.next().await? {
            Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                Ok(f) => return Some(f),
                Err(e) => warn!("undecodable frame from hub: {e}"),
            },
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

async fn await_confirmation(
    ws: &mut WsStream,
    channel: &str,
    subscribed: bool,
    wait: Duration,
) -> anyhow::Result<()> {
    let confirmed = timeout(wait, async {
        while let Some(frame) = next_frame(ws).await {
            match frame {
                Frame::Subscribed { channel: c } if subscribed && c == channel => return Ok(()),
                Frame::Unsubscribed { channel: c } if !subscribed && c == channel => {
                    return Ok(())
                }
                Frame::Error { message, .. } => anyhow::bail!("hub rejected request: {message}"),
                other => debug!(?other, "ignoring frame while awaiting confirmation"),
            }
        }
        anyhow::bail!("connection closed by hub")
    })
    .await;
    match confirmed {
        Ok(res) => res,
        Err(_) => anyhow::bail!("timed out waiting for hub confirmation on {channel}"),
    }
}

/// Subscribe and wait (bounded) for the hub to confirm.
pub async fn subscribe(ws: &mut WsStream, channel: &str, wait: Duration) -> anyhow::Result<()> {
    send(
        ws,
        &Frame::Subscribe {
            channel: channel.to_string(),
        },
    )
    .await?;
    await_confirmation(ws, channel, true, wait).await
}

pub async fn unsubscribe(ws: &mut WsStream, channel: &str, wait: Duration) -> anyhow::Result<()> {
    send(
        ws,
        &Frame::Unsubscribe {
            channel: channel.to_string(),
        },
    )
    .await?;
    let res = await_confirmation(ws, channel, false, wait).await;
    let _ = ws.close(None).await;
    res
}

/// Next message published on `channel`; `None` once the hub goes away.
pub async fn next_report(ws: &mut WsStream, channel: &str) -> Option<Incoming> {
    loop {
        match next_frame(ws).await? {
            Frame::Message { channel: c, message } if c == channel => {
                return Some(decode_report(message));
            }
            other => debug!(?other, "ignoring frame"),
        }
    }
}

pub fn decode_report(message: serde_json::Value) -> Incoming {
    match serde_json::from_value::<Report>(message.clone()) {
        Ok(r) => Incoming::Report(r),
        Err(_) => Incoming::Undecodable(message.to_string()),
    }
}
