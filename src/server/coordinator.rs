//! Control server
//!
//! Wires the roster store, the broadcast hub and the device link together.
//! Three independently timed activities share them:
//!
//! ```text
//!   viewer sessions ──► dispatch ──► RosterStore ──► snapshot file
//!   (cooperative tasks)    │              │
//!                          │              └──► dead ids ──► DeviceLink ──► serial
//!                          └──► BroadcastHub ──► every viewer
//!
//!   re-send task (1s tick) ──► dead ids ──► DeviceLink
//!   monitor thread          ◄── serial replies (log only)
//! ```
//!
//! Sessions and the re-send task synchronize only through the store's and
//! link's own locks; the monitor thread never writes.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{accept_async, WebSocketStream};

use crate::device::DeviceLink;
use crate::error::Result;
use crate::hub::{BroadcastHub, ViewerSession};
use crate::protocol::DeviceCommand;
use crate::roster::RosterStore;
use crate::server::config::ServerConfig;
use crate::server::message::{Action, ClientRequest};

/// The control server
pub struct Server {
    config: ServerConfig,
    roster: Arc<RosterStore>,
    hub: Arc<BroadcastHub>,
    device: Arc<DeviceLink>,
    next_session_id: AtomicU64,
}

impl Server {
    /// Open the serial device and the roster snapshot, ready to run
    ///
    /// A serial open failure is fatal; there is no recovery path for a
    /// missing device.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let device = Arc::new(DeviceLink::open(&config.device_path, config.baud_rate)?);
        let roster = Arc::new(
            RosterStore::open(
                &config.snapshot_path,
                config.player_count,
                config.allow_revive,
            )
            .await?,
        );

        Ok(Self {
            config,
            roster,
            hub: Arc::new(BroadcastHub::new()),
            device,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Run the server
    ///
    /// Starts the reply monitor and the periodic re-send, then accepts
    /// viewer connections until the process ends.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Control server listening");

        self.device.spawn_monitor().await?;
        let _resend_handle = self.spawn_resend_task();

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Control server listening");

        self.device.spawn_monitor().await?;
        let resend_handle = self.spawn_resend_task();

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        resend_handle.abort();
        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer)) => self.handle_connection(socket, peer),
                Err(e) => tracing::error!(error = %e, "Failed to accept connection"),
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer: SocketAddr) {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let context = SessionContext {
            roster: Arc::clone(&self.roster),
            hub: Arc::clone(&self.hub),
            device: Arc::clone(&self.device),
            disable_kills: self.config.disable_kills,
        };

        tokio::spawn(async move {
            context.run(session_id, socket, peer).await;
        });
    }

    /// Spawn the periodic kill-set re-send task
    ///
    /// The device protocol is unacknowledged; re-sending the current kill
    /// set every interval covers frames the boards missed to serial noise
    /// or a board-side reset.
    fn spawn_resend_task(&self) -> JoinHandle<()> {
        let roster = Arc::clone(&self.roster);
        let device = Arc::clone(&self.device);
        let disable_kills = self.config.disable_kills;
        let interval = self.config.resend_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so sends start
            // one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if disable_kills {
                    continue;
                }
                let dead = roster.dead_ids().await;
                if let Err(e) = device.send(&DeviceCommand::Detonate(dead)).await {
                    tracing::error!(error = %e, "Periodic kill-set re-send failed");
                }
            }
        })
    }
}

/// Everything one viewer session needs, cloned out of the server
struct SessionContext {
    roster: Arc<RosterStore>,
    hub: Arc<BroadcastHub>,
    device: Arc<DeviceLink>,
    disable_kills: bool,
}

impl SessionContext {
    async fn run(self, session_id: u64, socket: TcpStream, peer: SocketAddr) {
        let ws = match accept_async(socket).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!(session_id, peer = %peer, error = %e, "Websocket handshake failed");
                return;
            }
        };
        let (mut sink, mut stream) = ws.split();
        let (session, mut rx) = ViewerSession::new(session_id, peer);

        // Writer task drains this session's queue; a slow viewer backs up
        // only its own queue, never the hub.
        let writer = tokio::spawn(async move {
            while let Some(payload) = rx.recv().await {
                let text = String::from_utf8_lossy(&payload).into_owned();
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        // The hub captures the snapshot under its own lock, so a concurrent
        // eliminate in another session cannot broadcast between snapshot
        // capture and registration and leave this viewer stale.
        self.hub
            .register(session, async {
                Bytes::from(self.roster.snapshot_event().await)
            })
            .await;

        if let Err(e) = self.session_loop(session_id, &mut stream).await {
            tracing::error!(session_id, error = %e, "Session ended with error");
        }

        // Every exit path funnels through here; unregistering drops the
        // session handle, which closes the queue and ends the writer.
        self.hub.unregister(session_id).await;
        let _ = writer.await;
    }

    async fn session_loop(
        &self,
        session_id: u64,
        stream: &mut SplitStream<WebSocketStream<TcpStream>>,
    ) -> Result<()> {
        while let Some(message) = stream.next().await {
            let message = match message {
                Ok(message) => message,
                // Abrupt closure ends the session normally.
                Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => break,
                Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => break,
                Err(e) => return Err(e.into()),
            };
            match message {
                Message::Text(text) => self.dispatch(session_id, &text).await?,
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    async fn dispatch(&self, session_id: u64, text: &str) -> Result<()> {
        let request: ClientRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Discarding unparseable message");
                return Ok(());
            }
        };

        match Action::parse(&request.action) {
            Some(action @ (Action::Eliminate | Action::Revive)) => {
                let alive = action == Action::Revive;
                for number in &request.numbers {
                    self.roster.set_liveness(*number, alive).await;
                }
                self.roster.save().await?;
                if !self.disable_kills {
                    let dead = self.roster.dead_ids().await;
                    self.device.send(&DeviceCommand::Detonate(dead)).await?;
                }
                let update = Bytes::from(self.roster.update_event().await);
                self.hub.broadcast(update).await;
            }
            Some(Action::Arm) => {
                tracing::info!(session_id, "Devices armed");
                self.device.send(&DeviceCommand::Arm(true)).await?;
            }
            Some(Action::Disarm) => {
                tracing::info!(session_id, "Devices disarmed");
                self.device.send(&DeviceCommand::Arm(false)).await?;
            }
            None => {
                tracing::warn!(session_id, action = %request.action, "Unsupported action");
            }
        }
        Ok(())
    }
}
