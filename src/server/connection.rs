//! Per-connection WebSocket loop
//!
//! Each accepted socket gets one task running [`Connection::run`]. Inbound
//! frames are decoded and routed in arrival order; outbound frames are
//! drained from the connection's bounded queue by a separate writer task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::incident::IncidentNotifier;
use crate::protocol::InboundEvent;
use crate::registry::{ClientHandle, HandleId, OutboundFrame};
use crate::router::EventRouter;
use crate::server::config::ServerConfig;
use crate::session::SessionContext;

/// How long the writer may keep flushing queued frames after the reader ends
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<TcpStream>;

pub(crate) struct Connection<N: IncidentNotifier> {
    ctx: SessionContext,
    config: ServerConfig,
    router: Arc<EventRouter<N>>,
}

impl<N: IncidentNotifier> Connection<N> {
    pub(crate) fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        config: ServerConfig,
        router: Arc<EventRouter<N>>,
    ) -> Self {
        Self {
            ctx: SessionContext::new(HandleId(session_id), peer_addr),
            config,
            router,
        }
    }

    /// Perform the handshake and serve the connection until it closes
    ///
    /// Disconnect cleanup runs whenever the handshake succeeded, whatever
    /// the reason the connection ended.
    pub(crate) async fn run(&mut self, socket: TcpStream) -> Result<()> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_message_size);

        let handshake = tokio_tungstenite::accept_async_with_config(socket, Some(ws_config));
        let ws = match tokio::time::timeout(self.config.handshake_timeout, handshake).await {
            Ok(ws) => ws?,
            Err(_) => return Err(Error::HandshakeTimeout),
        };

        let (sink, mut stream) = ws.split();
        let (handle, outbound) =
            ClientHandle::channel(self.ctx.session_id.0, self.config.outbound_queue_capacity);

        let session_id = self.ctx.session_id;
        let keepalive = self.config.keepalive_interval();
        let mut writer = tokio::spawn(write_loop(session_id, sink, outbound, keepalive));

        tracing::debug!(session_id = %session_id, peer = %self.ctx.peer_addr, "WebSocket established");

        let result = self.read_loop(&handle, &mut stream).await;

        self.router.disconnect(&handle).await;
        drop(handle);

        // Queue closes once the last handle clone is gone; let the writer flush
        if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
            writer.abort();
        }

        tracing::debug!(
            session_id = %session_id,
            role = ?self.ctx.role,
            events = self.ctx.events,
            rejected = self.ctx.rejected_frames,
            duration_ms = self.ctx.duration().as_millis() as u64,
            "Session ended"
        );

        result
    }

    async fn read_loop(
        &mut self,
        handle: &Arc<ClientHandle>,
        stream: &mut SplitStream<WsStream>,
    ) -> Result<()> {
        loop {
            let next = tokio::select! {
                _ = handle.close_requested() => {
                    tracing::info!(session_id = %self.ctx.session_id, "Connection superseded, closing");
                    return Ok(());
                }
                next = self.next_message(stream) => next?,
            };

            let Some(message) = next else {
                return Ok(());
            };

            match message {
                Message::Text(text) => self.on_text(handle, text.as_str()).await,
                Message::Binary(data) => {
                    tracing::debug!(
                        session_id = %self.ctx.session_id,
                        len = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Close(_) => return Ok(()),
                // Pongs and pings only need to reset the idle timer
                _ => {}
            }
        }
    }

    async fn next_message(&self, stream: &mut SplitStream<WsStream>) -> Result<Option<Message>> {
        let next = match self.config.idle_timeout {
            Some(idle) => tokio::time::timeout(idle, stream.next())
                .await
                .map_err(|_| Error::IdleTimeout)?,
            None => stream.next().await,
        };

        next.transpose().map_err(Error::from)
    }

    async fn on_text(&mut self, handle: &Arc<ClientHandle>, text: &str) {
        match InboundEvent::decode(text) {
            Ok(event) => {
                self.ctx.observe(&event);
                tracing::trace!(session_id = %self.ctx.session_id, event = event.name(), "Inbound event");
                self.router.handle(handle, event).await;
            }
            Err(e) => {
                self.ctx.reject();
                self.router.state().stats.malformed_event();
                tracing::warn!(session_id = %self.ctx.session_id, error = %e, "Dropping undecodable frame");
            }
        }
    }
}

/// Drain the outbound queue into the socket, pinging the peer on the keep-alive interval
async fn write_loop(
    session_id: HandleId,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    keepalive: Option<Duration>,
) {
    let mut ping = keepalive.map(|every| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        let message = tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => Message::text(frame.to_string()),
                None => break,
            },
            _ = next_ping(&mut ping) => Message::Ping(Default::default()),
        };

        if let Err(e) = sink.send(message).await {
            tracing::debug!(session_id = %session_id, error = %e, "Write failed");
            return;
        }
    }

    let _ = sink.close().await;
}

async fn next_ping(ping: &mut Option<Interval>) {
    match ping {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
