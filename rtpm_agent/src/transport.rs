//! Pub/sub transport boundary and the WebSocket client that talks to the hub.

use std::future::Future;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{
    connect_async, tungstenite, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::proto::Frame;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid hub url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("connect to {url} failed: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("hub rejected request: {0}")]
    Rejected(String),
    #[error("connection closed by hub")]
    Closed,
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What the monitor needs from a pub/sub channel. Connecting is left to the
/// implementation's constructor.
pub trait Transport: Send {
    /// Resolves once the transport confirms delivery of `message`.
    fn publish(
        &mut self,
        channel: &str,
        message: Value,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// WebSocket client of the rtpm hub, subscribed to one channel.
///
/// A background reader keeps the socket drained: channel traffic is consumed
/// as it arrives and only control frames (acks, confirmations, errors) are
/// handed to the caller.
pub struct WsTransport {
    sink: SplitSink<WsStream, Message>,
    control: mpsc::UnboundedReceiver<Frame>,
    reader: JoinHandle<()>,
    channel: String,
    next_seq: u64,
    wait: Duration,
}

async fn read_loop(mut stream: SplitStream<WsStream>, control: mpsc::UnboundedSender<Frame>) {
    let mut relayed: u64 = 0;
    while let Some(msg) = stream.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("hub connection error: {e}");
                break;
            }
        };
        match Frame::from_text(&text) {
            Ok(Frame::Message { .. }) => relayed += 1,
            Ok(frame) => {
                if control.send(frame).is_err() {
                    break;
                }
            }
            Err(e) => warn!("undecodable frame from hub: {e}"),
        }
    }
    debug!(relayed, "hub reader finished");
}

impl WsTransport {
    /// Open the socket and subscribe to `channel`; each step waits at most `wait`.
    pub async fn connect(
        url: &str,
        channel: &str,
        wait: Duration,
    ) -> Result<Self, TransportError> {
        let parsed = Url::parse(url).map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let (ws, _) = timeout(wait, connect_async(parsed.as_str()))
            .await
            .map_err(|_| TransportError::Timeout("connect"))?
            .map_err(|source| TransportError::Connect {
                url: url.to_string(),
                source,
            })?;

        let (sink, stream) = ws.split();
        let (tx, control) = mpsc::unbounded_channel();
        let mut t = Self {
            sink,
            control,
            reader: tokio::spawn(read_loop(stream, tx)),
            channel: channel.to_string(),
            next_seq: 0,
            wait,
        };
        info!(channel, "subscribing");
        t.send(&Frame::Subscribe {
            channel: channel.to_string(),
        })
        .await?;
        timeout(wait, t.await_subscription(true))
            .await
            .map_err(|_| TransportError::Timeout("subscribe confirmation"))??;
        info!(channel, "channel subscribed");
        Ok(t)
    }

    async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.sink.send(Message::Text(frame.to_text()?)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Frame, TransportError> {
        self.control.recv().await.ok_or(TransportError::Closed)
    }

    async fn await_subscription(&mut self, subscribed: bool) -> Result<(), TransportError> {
        loop {
            match self.recv().await? {
                Frame::Subscribed { channel } if subscribed && channel == self.channel => {
                    return Ok(())
                }
                Frame::Unsubscribed { channel } if !subscribed && channel == self.channel => {
                    return Ok(())
                }
                Frame::Error { message, .. } => return Err(TransportError::Rejected(message)),
                other => debug!(?other, "ignoring frame while awaiting subscription change"),
            }
        }
    }
}

impl Transport for WsTransport {
    async fn publish(&mut self, channel: &str, message: Value) -> Result<(), TransportError> {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.send(&Frame::Publish {
            channel: channel.to_string(),
            seq,
            message,
        })
        .await?;

        // Acks for earlier, abandoned publishes may still be queued.
        loop {
            match self.recv().await? {
                Frame::Ack { seq: s } if s == seq => return Ok(()),
                Frame::Error { seq: Some(s), message } if s == seq => {
                    return Err(TransportError::Rejected(message))
                }
                other => debug!(?other, seq, "ignoring frame while awaiting ack"),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        info!(channel = %self.channel, "unsubscribing");
        self.send(&Frame::Unsubscribe {
            channel: self.channel.clone(),
        })
        .await?;
        let wait = self.wait;
        let res = timeout(wait, self.await_subscription(false))
            .await
            .map_err(|_| TransportError::Timeout("unsubscribe confirmation"))
            .and_then(|r| r);
        let _ = self.sink.close().await;
        self.reader.abort();
        if res.is_ok() {
            info!(channel = %self.channel, "channel unsubscribed");
        }
        res
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
