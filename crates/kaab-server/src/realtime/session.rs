//! One WebSocket client from upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use kaab_core::ChannelId;
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::connection::ClientConnection;
use super::dispatcher::Dispatcher;

/// Per-session transport limits.
#[derive(Clone, Copy, Debug)]
pub struct SessionLimits {
    /// Outbound frames buffered per connection before dropping.
    pub outbound_queue: usize,
    /// Interval between server Ping frames.
    pub heartbeat_interval: Duration,
    /// Close after this long without a Pong.
    pub heartbeat_timeout: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(90),
        }
    }
}

/// Run a session until the client goes away, stops answering pings, or
/// `shutdown` fires.
#[instrument(skip_all, fields(channel_id = %channel_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    channel_id: ChannelId,
    dispatcher: Arc<Dispatcher>,
    limits: SessionLimits,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Arc<String>>(limits.outbound_queue.max(1));
    let connection = Arc::new(ClientConnection::new(channel_id.clone(), send_tx));
    let session_token = shutdown.child_token();

    let started = Instant::now();
    info!("client connected");
    counter!("ws_connections_total").increment(1);
    gauge!("ws_connections_active").increment(1.0);

    let mut ctx = dispatcher.connect(connection.clone()).await;

    let outbound_conn = connection.clone();
    let outbound_token = session_token.clone();
    let outbound = tokio::spawn(async move {
        let mut ping = tokio::time::interval(limits.heartbeat_interval);
        let _ = ping.tick().await;

        loop {
            tokio::select! {
                () = outbound_token.cancelled() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
                frame = send_rx.recv() => {
                    let Some(frame) = frame else { break };
                    if ws_tx.send(Message::Text(String::clone(&frame).into())).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if !outbound_conn.check_alive()
                        && outbound_conn.last_pong_elapsed() > limits.heartbeat_timeout
                    {
                        warn!(timeout = ?limits.heartbeat_timeout, "client unresponsive, disconnecting");
                        break;
                    }
                    if ws_tx.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
        outbound_token.cancel();
    });

    loop {
        let msg = tokio::select! {
            () = session_token.cancelled() => break,
            msg = ws_rx.next() => msg,
        };
        let Some(Ok(msg)) = msg else { break };

        match msg {
            Message::Text(text) => dispatcher.handle_text(&mut ctx, text.as_str()).await,
            Message::Binary(data) => match std::str::from_utf8(&data) {
                Ok(text) => dispatcher.handle_text(&mut ctx, text).await,
                Err(_) => debug!(len = data.len(), "ignoring non-UTF8 binary frame"),
            },
            Message::Ping(_) | Message::Pong(_) => connection.mark_alive(),
            Message::Close(_) => {
                debug!("client sent close frame");
                break;
            }
        }
    }

    dispatcher.disconnect(&mut ctx).await;
    session_token.cancel();
    let _ = outbound.await;

    info!(
        dropped = connection.drop_count(),
        "client disconnected"
    );
    counter!("ws_disconnections_total").increment(1);
    gauge!("ws_connections_active").decrement(1.0);
    histogram!("ws_connection_duration_seconds").record(started.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_settings_defaults() {
        let limits = SessionLimits::default();
        assert_eq!(limits.outbound_queue, 256);
        assert_eq!(limits.heartbeat_interval, Duration::from_secs(30));
        assert!(limits.heartbeat_timeout > limits.heartbeat_interval);
    }
}
