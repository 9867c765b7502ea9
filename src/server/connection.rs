//! Per-connection handler
//!
//! Each accepted socket gets one task pair:
//! - the reader (this task) feeds inbound text frames to the router
//! - the writer drains the connection's bounded outbound queue and drives
//!   keepalive
//!
//! Either side ending closes the other. The session leaves the router as
//! soon as the reader stops; a writer stuck on a stalled peer is aborted
//! after [`WRITER_GRACE`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::router::{Keepalive, RelayObserver, Router};
use crate::server::config::ServerConfig;
use crate::session::{ConnectionHandle, ConnectionId, OutboundQueue};

/// How long a closing connection's writer may take to flush
pub const WRITER_GRACE: Duration = Duration::from_secs(1);

/// A single client connection
pub struct Connection<O: RelayObserver> {
    id: ConnectionId,
    peer_addr: SocketAddr,
    config: ServerConfig,
    router: Arc<Router<O>>,
    shutdown: CancellationToken,
}

impl<O: RelayObserver> Connection<O> {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Arc<Router<O>>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_addr,
            config,
            router,
            shutdown,
        }
    }

    /// Upgrade the socket and run the session until either side closes
    pub async fn run(self, socket: TcpStream) -> Result<()> {
        let ws = tokio_tungstenite::accept_async_with_config(socket, Some(self.ws_config())).await?;
        let (ws_tx, mut ws_rx) = ws.split();

        let (handle, queue) = ConnectionHandle::channel(
            self.id,
            self.config.outbound_queue_capacity,
            self.config.overflow_policy,
        );
        let close = queue.close_token();
        self.router.connect(handle.clone()).await;

        tracing::info!(
            connection_id = %self.id,
            peer = %self.peer_addr,
            "Client connected"
        );

        let writer = tokio::spawn(write_loop(
            self.id,
            ws_tx,
            queue,
            Arc::clone(&self.router),
            self.config.ping_interval,
            self.config.idle_timeout,
        ));

        let result = self.read_loop(&mut ws_rx, &close).await;

        handle.close();
        self.router.disconnect(self.id).await;
        stop_writer(self.id, writer, WRITER_GRACE).await;

        tracing::info!(
            connection_id = %self.id,
            peer = %self.peer_addr,
            dropped_frames = handle.dropped_frames(),
            "Client disconnected"
        );

        result
    }

    fn ws_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.config.max_frame_size);
        config.max_frame_size = Some(self.config.max_frame_size);
        config
    }

    async fn read_loop<S>(&self, ws_rx: &mut S, close: &CancellationToken) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
    {
        loop {
            let next = tokio::select! {
                _ = close.cancelled() => return Ok(()),
                _ = self.shutdown.cancelled() => return Ok(()),
                next = ws_rx.next() => next,
            };

            let Some(message) = next else {
                return Ok(());
            };

            match message? {
                Message::Text(text) => {
                    self.router.handle_frame(self.id, text.as_str()).await;
                }
                // Some clients send envelopes as binary frames
                Message::Binary(data) => {
                    let text = String::from_utf8_lossy(&data);
                    self.router.handle_frame(self.id, &text).await;
                }
                Message::Close(frame) => {
                    tracing::debug!(connection_id = %self.id, frame = ?frame, "Close frame received");
                    return Ok(());
                }
                // Answered by tungstenite; still proof the peer is alive
                Message::Ping(_) | Message::Pong(_) => {
                    self.router.registry().touch(self.id).await;
                }
                Message::Frame(_) => {}
            }
        }
    }
}

async fn write_loop<O, S>(
    id: ConnectionId,
    mut ws_tx: S,
    mut queue: OutboundQueue,
    router: Arc<Router<O>>,
    ping_interval: Option<Duration>,
    idle_timeout: Option<Duration>,
) where
    O: RelayObserver,
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let mut ticker = ping_interval.map(|period| tokio::time::interval_at(Instant::now() + period, period));

    loop {
        tokio::select! {
            frame = queue.next() => {
                let Some(frame) = frame else { break };
                let Some(text) = text_frame(id, frame) else { continue };
                if let Err(e) = ws_tx.send(Message::Text(text)).await {
                    tracing::debug!(connection_id = %id, error = %e, "Write failed");
                    break;
                }
            }
            _ = next_tick(&mut ticker) => {
                match router.keepalive(id, idle_timeout).await {
                    Keepalive::Pinged => {
                        // Transport-level ping; clients that ignore SYSTEM pings still pong
                        if let Err(e) = ws_tx.send(Message::Ping(Bytes::new())).await {
                            tracing::debug!(connection_id = %id, error = %e, "Ping failed");
                            break;
                        }
                    }
                    Keepalive::Expired | Keepalive::Gone => break,
                }
            }
        }
    }

    // Stops the reader if the writer ended first
    queue.close_token().cancel();
    if let Err(e) = ws_tx.close().await {
        tracing::trace!(connection_id = %id, error = %e, "Close after disconnect");
    }
}

/// Wait for the writer to finish, aborting it after `grace`
async fn stop_writer(id: ConnectionId, mut writer: JoinHandle<()>, grace: Duration) {
    match tokio::time::timeout(grace, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %id, error = %e, "Writer task failed");
        }
        Err(_) => {
            tracing::debug!(connection_id = %id, "Writer stalled, aborting");
            writer.abort();
        }
    }
}

fn text_frame(id: ConnectionId, frame: Bytes) -> Option<Utf8Bytes> {
    match Utf8Bytes::try_from(frame) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(connection_id = %id, error = %e, "Dropping non-UTF-8 outbound frame");
            None
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stalled_writer_is_aborted() {
        let writer = tokio::spawn(std::future::pending::<()>());
        let abort = writer.abort_handle();

        tokio::time::timeout(
            Duration::from_secs(1),
            stop_writer(ConnectionId::new(1), writer, Duration::from_millis(20)),
        )
        .await
        .expect("stop_writer did not return");

        tokio::task::yield_now().await;
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_finished_writer_is_joined() {
        let writer = tokio::spawn(async {});
        stop_writer(ConnectionId::new(1), writer, Duration::from_secs(1)).await;
    }

    #[test]
    fn test_text_frame_rejects_invalid_utf8() {
        let id = ConnectionId::new(1);
        assert!(text_frame(id, Bytes::from_static(b"{}")).is_some());
        assert!(text_frame(id, Bytes::from_static(&[0xff, 0xfe])).is_none());
    }
}
