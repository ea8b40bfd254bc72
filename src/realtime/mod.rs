//! Realtime notification channel
//!
//! One long-lived Socket.IO connection per application session, carrying
//! wallet balance pushes and payment status updates. [`RealtimeChannel`] is a
//! service object with an explicit lifecycle:
//!
//! - [`RealtimeChannel::connect`] starts the connection task (idempotent)
//! - [`RealtimeChannel::on_event`] / [`RealtimeChannel::off`] manage handlers
//! - [`RealtimeChannel::disconnect`] stops the task and drops every handler
//!
//! `payment_status` messages feed the shared [`PaymentCorrelationStore`]
//! before handlers see them.

use crate::config::AppConfig;
use crate::correlation::PaymentCorrelationStore;
use crate::types::{constants::realtime as socket, events, ChannelEvent, ConnectionState};
use crate::{ClientError, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use url::Url;

pub mod protocol;
pub mod router;

pub use protocol::{EnginePacket, OpenInfo, SocketPacket};
pub use router::{parse_payload, MessageRouter};

/// Handler invoked for every event of the name it was registered under
pub type EventHandler = dyn Fn(&ChannelEvent) + Send + Sync;

/// Handle returned by [`RealtimeChannel::on_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Liveness window used until the server handshake says otherwise
const DEFAULT_LIVENESS: Duration = Duration::from_secs(45);

/// Realtime connection configuration
///
/// Defaults follow the Socket.IO client: reconnection on, 1 s between
/// attempts, unlimited attempts, 20 s connect timeout.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Socket host, `http(s)://` or `ws(s)://`
    pub host: String,
    pub path: String,
    pub reconnect: bool,
    pub reconnect_delay: Duration,
    /// `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    pub connect_timeout: Duration,
}

impl RealtimeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: socket::SOCKET_PATH.to_string(),
            reconnect: true,
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_attempts: None,
            connect_timeout: Duration::from_secs(20),
        }
    }

    pub fn from_app(config: &AppConfig) -> Self {
        Self::new(config.socket_host.clone())
    }

    pub fn with_reconnect(mut self, reconnect: bool) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Websocket URL of the Engine.IO endpoint
    pub fn websocket_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.host)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::config(format!(
                    "Unsupported socket host scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::config("Cannot convert socket host to a websocket URL"))?;
        url.set_path(&self.path);
        url.query_pairs_mut()
            .clear()
            .append_pair("EIO", socket::ENGINE_IO_VERSION)
            .append_pair("transport", "websocket");
        Ok(url)
    }
}

struct Registration {
    id: HandlerId,
    event: String,
    handler: Arc<EventHandler>,
}

struct Shared {
    handlers: RwLock<Vec<Registration>>,
    state: watch::Sender<ConnectionState>,
    router: MessageRouter,
    next_id: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Realtime channel {} -> {}", previous, state);
        }
    }

    async fn emit(&self, event: &ChannelEvent) {
        let handlers = self.handlers.read().await;
        for registration in handlers.iter().filter(|r| r.event == event.name()) {
            (registration.handler)(event);
        }
    }
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// How one connection attempt ended
enum SessionEnd {
    Cancelled,
    /// Server sent a Socket.IO DISCONNECT
    ServerDisconnect,
    /// Server refused the namespace connection
    Refused(String),
    /// Connection established, then lost
    Lost(String),
    /// Connection never established
    Failed(String),
}

/// Socket.IO client for wallet and payment notifications
#[derive(Clone)]
pub struct RealtimeChannel {
    config: RealtimeConfig,
    shared: Arc<Shared>,
    running: Arc<Mutex<Option<Running>>>,
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

impl RealtimeChannel {
    pub fn new(config: RealtimeConfig, store: PaymentCorrelationStore) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            shared: Arc::new(Shared {
                handlers: RwLock::new(Vec::new()),
                state,
                router: MessageRouter::new(store),
                next_id: AtomicU64::new(1),
            }),
            running: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch connection state changes
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Store fed by `payment_status` messages; read-only to callers
    pub fn correlations(&self) -> &PaymentCorrelationStore {
        self.shared.router.store()
    }

    /// Start the connection task
    ///
    /// A second call while a connection task is alive is a no-op.
    pub async fn connect(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if let Some(current) = running.as_ref() {
            if !current.handle.is_finished() {
                tracing::debug!("Realtime channel already started");
                return Ok(());
            }
        }

        let url = self.config.websocket_url()?;
        tracing::info!("Connecting realtime channel to {}", url);

        self.shared.set_state(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_connection(
            url,
            self.config.clone(),
            self.shared.clone(),
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        Ok(())
    }

    /// Stop the connection task and deregister every handler
    pub async fn disconnect(&self) {
        let running = self.running.lock().await.take();
        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::error!("Realtime connection task failed: {}", e);
            }
        }
        self.shared.handlers.write().await.clear();
        self.shared.set_state(ConnectionState::Disconnected);
        tracing::info!("Realtime channel closed");
    }

    /// Register `handler` for events named `event`
    pub async fn on_event(
        &self,
        event: &str,
        handler: impl Fn(&ChannelEvent) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        self.shared.handlers.write().await.push(Registration {
            id,
            event: event.to_string(),
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove a handler; returns whether it was registered
    pub async fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.shared.handlers.write().await;
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        handlers.len() != before
    }

    pub async fn handler_count(&self) -> usize {
        self.shared.handlers.read().await.len()
    }
}

async fn run_connection(
    url: Url,
    config: RealtimeConfig,
    shared: Arc<Shared>,
    cancel: CancellationToken,
) {
    let mut attempts: u32 = 0;

    loop {
        match run_session(&url, &config, &shared, &cancel).await {
            SessionEnd::Cancelled => break,
            SessionEnd::ServerDisconnect => {
                shared
                    .emit(&ChannelEvent::Disconnected {
                        reason: "io server disconnect".to_string(),
                    })
                    .await;
                break;
            }
            SessionEnd::Refused(message) => {
                tracing::error!("Realtime connection refused: {}", message);
                shared.emit(&ChannelEvent::ConnectError { message }).await;
                break;
            }
            SessionEnd::Lost(reason) => {
                tracing::warn!("Realtime channel disconnected: {}", reason);
                shared.emit(&ChannelEvent::Disconnected { reason }).await;
                attempts = 0;
            }
            SessionEnd::Failed(message) => {
                tracing::error!("Realtime connection failed: {}", message);
                shared.emit(&ChannelEvent::ConnectError { message }).await;
            }
        }

        if !config.reconnect || cancel.is_cancelled() {
            break;
        }
        attempts += 1;
        if let Some(max) = config.max_reconnect_attempts {
            if attempts > max {
                tracing::warn!("Giving up on realtime channel after {} attempts", max);
                break;
            }
        }

        shared.set_state(ConnectionState::Reconnecting);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    shared.set_state(ConnectionState::Disconnected);
}

async fn run_session(
    url: &Url,
    config: &RealtimeConfig,
    shared: &Shared,
    cancel: &CancellationToken,
) -> SessionEnd {
    let connecting = tokio::select! {
        _ = cancel.cancelled() => return SessionEnd::Cancelled,
        result = tokio::time::timeout(config.connect_timeout, connect_async(url.as_str())) => result,
    };
    let stream = match connecting {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => return SessionEnd::Failed(ClientError::from(e).to_string()),
        Err(_) => return SessionEnd::Failed("timeout".to_string()),
    };

    let (mut write, mut read) = stream.split();
    let mut connected = false;
    let mut liveness = DEFAULT_LIVENESS;
    let idle = tokio::time::sleep(liveness);
    tokio::pin!(idle);

    let end = |connected: bool, reason: String| {
        if connected {
            SessionEnd::Lost(reason)
        } else {
            SessionEnd::Failed(reason)
        }
    };

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => {
                let goodbye = SocketPacket::Disconnect { nsp: protocol::ROOT_NAMESPACE.to_string() };
                if let Err(e) = write.send(Message::Text(goodbye.to_frame())).await {
                    tracing::debug!("Failed to send disconnect packet: {}", e);
                }
                if let Err(e) = write.close().await {
                    tracing::debug!("Failed to close websocket: {}", e);
                }
                return SessionEnd::Cancelled;
            }
            _ = &mut idle => return end(connected, "ping timeout".to_string()),
            frame = read.next() => frame,
        };

        let text = match frame {
            None | Some(Ok(Message::Close(_))) => return end(connected, "transport close".to_string()),
            Some(Err(e)) => return end(connected, format!("transport error: {}", e)),
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(_)) => continue,
        };

        let packet = match EnginePacket::decode(&text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Discarding realtime frame: {}", e);
                continue;
            }
        };

        let outgoing = match packet {
            EnginePacket::Open(info) => {
                liveness = info.liveness_window();
                idle.as_mut().reset(tokio::time::Instant::now() + liveness);
                Some(SocketPacket::connect().to_frame())
            }
            EnginePacket::Ping(data) => {
                idle.as_mut().reset(tokio::time::Instant::now() + liveness);
                Some(EnginePacket::Pong(data).encode())
            }
            EnginePacket::Close => return end(connected, "transport close".to_string()),
            EnginePacket::Message(data) => {
                if let Some(finished) = handle_socket_packet(&data, shared, &mut connected).await {
                    return finished;
                }
                None
            }
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => None,
        };

        if let Some(outgoing) = outgoing {
            if let Err(e) = write.send(Message::Text(outgoing)).await {
                return end(connected, format!("transport error: {}", e));
            }
        }
    }
}

/// Handle one Socket.IO packet; `Some` ends the session
async fn handle_socket_packet(
    data: &str,
    shared: &Shared,
    connected: &mut bool,
) -> Option<SessionEnd> {
    let packet = match SocketPacket::decode(data) {
        Ok(packet) => packet,
        Err(e) => {
            tracing::warn!("Discarding realtime packet: {}", e);
            return None;
        }
    };

    match packet {
        SocketPacket::Connect { data, .. } => {
            let sid = data
                .as_ref()
                .and_then(|d| d.get("sid"))
                .and_then(Value::as_str)
                .map(str::to_string);
            *connected = true;
            shared.set_state(ConnectionState::Connected);
            tracing::info!("Realtime channel connected (sid {:?})", sid);
            shared.emit(&ChannelEvent::Connected { sid }).await;
            None
        }
        SocketPacket::ConnectError { data, .. } => Some(SessionEnd::Refused(
            protocol::connect_error_message(data.as_ref()),
        )),
        SocketPacket::Disconnect { .. } => Some(SessionEnd::ServerDisconnect),
        SocketPacket::Event { name, args, .. } => {
            if !events::is_routed(&name) {
                tracing::debug!("Ignoring realtime event {}", name);
                return None;
            }
            let Some(payload) = args.first() else {
                return None;
            };
            for event in shared.router.route(&name, payload).await {
                shared.emit(&event).await;
            }
            None
        }
        SocketPacket::Ack { .. } => None,
    }
}

#[cfg(test)]
mod tests;
