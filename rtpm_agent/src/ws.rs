//! Hub side of the pub/sub protocol: WebSocket upgrade and per-connection handler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::proto::Frame;
use crate::state::HubState;

pub fn router(state: HubState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Bind `addr` and serve the hub on a background task; returns the bound address.
pub async fn spawn_hub(
    addr: SocketAddr,
    state: HubState,
) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(state)).await {
            warn!("hub server stopped: {e}");
        }
    });
    Ok((local, task))
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<HubState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: HubState) {
    let clients = state.client_count.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(clients, "client connected");

    // Ensure we decrement on disconnect (drop).
    struct ClientGuard(HubState);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            self.0.client_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
    let _guard = ClientGuard(state.clone());

    let (mut sink, mut stream) = socket.split();
    // Replies and forwarded messages share one writer so frames never interleave.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let Ok(text) = frame.to_text() else { continue };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let mut subs: HashMap<String, JoinHandle<()>> = HashMap::new();
    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let reply = match Frame::from_text(&text) {
            Ok(frame) => handle_frame(frame, &state, &out_tx, &mut subs).await,
            Err(e) => Frame::Error {
                seq: None,
                message: format!("malformed frame: {e}"),
            },
        };
        if out_tx.send(reply).is_err() {
            break;
        }
    }

    for (_, task) in subs.drain() {
        task.abort();
    }
    drop(out_tx);
    let _ = writer.await;
    drop(_guard);
    debug!(clients = state.clients(), "client disconnected");
}

async fn handle_frame(
    frame: Frame,
    state: &HubState,
    out: &mpsc::UnboundedSender<Frame>,
    subs: &mut HashMap<String, JoinHandle<()>>,
) -> Frame {
    match frame {
        Frame::Subscribe { channel } => {
            if !subs.contains_key(&channel) {
                // Subscribe before confirming so nothing published afterwards is missed.
                let rx = state.channel(&channel).await.subscribe();
                let task = tokio::spawn(forward(channel.clone(), rx, out.clone()));
                subs.insert(channel.clone(), task);
            }
            info!(channel = %channel, "channel subscribed");
            Frame::Subscribed { channel }
        }
        Frame::Unsubscribe { channel } => {
            if let Some(task) = subs.remove(&channel) {
                task.abort();
            }
            info!(channel = %channel, "channel unsubscribed");
            Frame::Unsubscribed { channel }
        }
        Frame::Publish {
            channel,
            seq,
            message,
        } => {
            // No subscribers is not an error: the message is accepted and dropped.
            let receivers = state.channel(&channel).await.send(message).unwrap_or(0);
            debug!(channel = %channel, seq, receivers, "published");
            Frame::Ack { seq }
        }
        other => Frame::Error {
            seq: None,
            message: format!("unexpected frame from client: {other:?}"),
        },
    }
}

async fn forward(
    channel: String,
    mut rx: tokio::sync::broadcast::Receiver<serde_json::Value>,
    out: mpsc::UnboundedSender<Frame>,
) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                let frame = Frame::Message {
                    channel: channel.clone(),
                    message,
                };
                if out.send(frame).is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(channel = %channel, skipped, "subscriber lagging, messages dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
