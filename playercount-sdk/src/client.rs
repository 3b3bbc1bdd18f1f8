//! Relay session client.
//!
//! This is the main entry point for SDK consumers. It owns the one transport
//! connection, runs the registration handshake, routes inbound frames and
//! emits [`Event`]s. All of it happens on a single spawned task: socket
//! frames, timer ticks and handle commands are taken one at a time from a
//! `select!` loop and each is handled to completion before the next.
//!
//! ## Registration
//!
//! Once the transport opens, a repeating timer (`register_interval`) starts.
//! The first tick announces the current identity (normally anonymous). Later
//! ticks poll the [`IdentitySource`]; as soon as it reports an account, the
//! authenticated handshake is sent and the timer is dropped.
//!
//! ## Reconnection
//!
//! Every close, error or failed connection attempt schedules exactly one
//! reconnect after `reconnect_after_close_delay`. There is no backoff and no
//! retry limit, so after a relay restart every client comes back on the same
//! fixed cadence.

use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior, Sleep};

use crate::chat::{self, ValidationError};
use crate::config::SessionConfig;
use crate::event::Event;
use crate::frame::{OutboundFrame, PlayerSnapshot};
use crate::identity::{Identity, IdentitySource};
use crate::router::{self, RoutedEvent};
use crate::session::{Action, SessionMachine, SessionState};
use crate::transport::{Connection, Connector, TransportError, WsConnector};

/// Read-only view of the session, refreshed after every transition.
#[derive(Debug, Clone, Default)]
pub struct SessionStatus {
    pub state: SessionState,
    pub identity: Identity,
    /// Latest snapshot received. Replaced, never merged.
    pub snapshot: PlayerSnapshot,
}

/// Commands the consumer can send to the session task.
#[derive(Debug)]
enum Command {
    Start,
    Send(OutboundFrame),
    Shutdown,
}

/// A handle to a running session. Cheap to clone; every clone talks to the
/// same task.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    status: Arc<Mutex<SessionStatus>>,
    max_message_length: usize,
}

impl SessionHandle {
    /// Connect, or reconnect immediately if a connection already exists.
    pub async fn start(&self) -> Result<()> {
        self.cmd_tx.send(Command::Start).await?;
        Ok(())
    }

    /// Send a frame on the open connection. Silently dropped when there is
    /// none: the relay only promises best effort.
    pub async fn send(&self, frame: OutboundFrame) {
        if self.cmd_tx.send(Command::Send(frame)).await.is_err() {
            tracing::debug!("session task is gone, dropping outbound frame");
        }
    }

    /// Validate and send a chat line. Invalid lines never reach the transport.
    pub async fn send_chat(&self, content: &str) -> Result<(), ValidationError> {
        let frame = chat::validate_message(content, self.max_message_length)?;
        self.send(frame).await;
        Ok(())
    }

    /// Close the connection and stop the session task.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    pub fn status(&self) -> SessionStatus {
        self.status.lock().clone()
    }

    pub fn state(&self) -> SessionState {
        self.status.lock().state
    }

    pub fn identity(&self) -> Identity {
        self.status.lock().identity.clone()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.status.lock().snapshot.clone()
    }
}

/// A session that has been configured but not spawned yet.
pub struct SessionClient {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    identity: Arc<dyn IdentitySource>,
}

impl SessionClient {
    pub fn new(
        config: SessionConfig,
        connector: impl Connector + 'static,
        identity: Arc<dyn IdentitySource>,
    ) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            identity,
        }
    }

    /// Spawn the session task in the `Disconnected` state. Nothing is opened
    /// until [`SessionHandle::start`] is called.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> (SessionHandle, mpsc::Receiver<Event>) {
        let (event_tx, event_rx) = mpsc::channel(4096);
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let status = Arc::new(Mutex::new(SessionStatus::default()));

        let handle = SessionHandle {
            cmd_tx,
            status: status.clone(),
            max_message_length: self.config.max_message_length,
        };

        let driver = Driver {
            machine: SessionMachine::new(self.config.reconnect_delay()),
            config: self.config,
            connector: self.connector,
            identity: self.identity,
            status,
            event_tx,
            cmd_rx,
            pending: None,
            link: None,
            register_timer: None,
            reconnect_timer: None,
        };
        tokio::spawn(driver.run());

        (handle, event_rx)
    }
}

/// Spawn a WebSocket session and start connecting right away.
///
/// Returns a handle for sending frames and a receiver for events.
pub fn connect(
    config: SessionConfig,
    identity: Arc<dyn IdentitySource>,
) -> (SessionHandle, mpsc::Receiver<Event>) {
    let (handle, events) = SessionClient::new(config, WsConnector, identity).spawn();
    // Fresh channel with spare capacity, so this cannot fail.
    let _ = handle.cmd_tx.try_send(Command::Start);
    (handle, events)
}

type PendingConnect = BoxFuture<'static, Result<Connection, TransportError>>;

struct Driver {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    identity: Arc<dyn IdentitySource>,
    machine: SessionMachine,
    status: Arc<Mutex<SessionStatus>>,
    event_tx: mpsc::Sender<Event>,
    cmd_rx: mpsc::Receiver<Command>,
    /// Connection attempt in flight.
    pending: Option<PendingConnect>,
    /// Open connection. Exclusively owned here.
    link: Option<Connection>,
    register_timer: Option<Interval>,
    reconnect_timer: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Start) => {
                        tracing::info!(url = %self.config.url, "starting session");
                        let actions = self.machine.start();
                        self.apply(actions).await;
                    }
                    Some(Command::Send(frame)) => {
                        let actions = self.machine.send(frame);
                        if actions.is_empty() {
                            tracing::debug!(state = self.machine.state().label(), "no open connection, dropping outbound frame");
                        }
                        self.apply(actions).await;
                    }
                    Some(Command::Shutdown) | None => break,
                },
                result = poll_pending(&mut self.pending) => {
                    self.pending = None;
                    match result {
                        Ok(conn) => {
                            tracing::info!(url = %self.config.url, "relay connection open");
                            self.link = Some(conn);
                            self.emit(Event::Connected).await;
                            let actions = self.machine.opened();
                            self.apply(actions).await;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "relay connection failed");
                            self.on_closed(e.to_string()).await;
                        }
                    }
                },
                frame = next_frame(&mut self.link) => match frame {
                    Some(Ok(text)) => self.on_frame(&text).await,
                    Some(Err(e)) => self.on_closed(e.to_string()).await,
                    None => self.on_closed("connection closed".to_string()).await,
                },
                _ = next_tick(&mut self.register_timer) => {
                    let was = self.machine.state();
                    let actions = self.machine.tick(self.identity.as_ref());
                    self.apply(actions).await;
                    if was != SessionState::Registered && self.machine.state() == SessionState::Registered {
                        let identity = self.machine.identity().clone();
                        tracing::info!(username = ?identity.username, "registered with relay");
                        self.emit(Event::Registered { identity }).await;
                    }
                },
                _ = reconnect_due(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    let actions = self.machine.reconnect_due();
                    self.apply(actions).await;
                },
            }
        }

        self.register_timer = None;
        self.reconnect_timer = None;
        self.close_link().await;
        tracing::debug!("session task stopped");
    }

    async fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Connect => {
                    self.reconnect_timer = None;
                    self.link = None;
                    tracing::debug!(url = %self.config.url, "connecting to relay");
                    self.pending = Some(self.connector.connect(&self.config.url));
                    self.emit(Event::Connecting).await;
                }
                Action::Close => self.close_link().await,
                Action::Send(frame) => self.write(frame).await,
                Action::StartRegisterTimer => {
                    let period = self.config.register_period();
                    let mut timer = tokio::time::interval_at(Instant::now() + period, period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.register_timer = Some(timer);
                }
                Action::CancelRegisterTimer => self.register_timer = None,
                Action::ScheduleReconnect(delay) => {
                    self.reconnect_timer = Some(Box::pin(tokio::time::sleep(delay)));
                }
            }
        }
        self.publish();
    }

    async fn write(&mut self, frame: OutboundFrame) {
        let Some(link) = self.link.as_mut() else {
            tracing::debug!("send rejected: no open connection");
            return;
        };
        let handshake = frame.is_handshake();
        if let Err(e) = link.sink.send(frame.to_json()).await {
            // The inbound side reports the close; reconnect is handled there.
            tracing::warn!(error = %e, "relay send failed");
        } else if handshake {
            tracing::debug!(?frame, "handshake sent");
        }
    }

    async fn close_link(&mut self) {
        self.pending = None;
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.sink.close().await {
                tracing::debug!(error = %e, "error closing relay connection");
            }
        }
    }

    async fn on_closed(&mut self, reason: String) {
        self.link = None;
        self.pending = None;
        let actions = self.machine.closed();
        if actions.is_empty() {
            return;
        }
        tracing::info!(
            %reason,
            delay_ms = self.config.reconnect_after_close_delay,
            "relay connection closed, will reconnect"
        );
        self.apply(actions).await;
        self.emit(Event::Disconnected { reason }).await;
    }

    async fn on_frame(&mut self, raw: &str) {
        match router::route(raw) {
            Ok(Some(event)) => self.on_routed(event).await,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                self.emit(Event::DecodeFailed {
                    error: e.to_string(),
                })
                .await;
            }
        }
    }

    async fn on_routed(&mut self, event: RoutedEvent) {
        match event {
            RoutedEvent::Count(snapshot) => {
                tracing::debug!(
                    official = snapshot.official_count,
                    total = snapshot.total_count,
                    players = snapshot.players.len(),
                    positions = snapshot.positions.len(),
                    "count update"
                );
                self.status.lock().snapshot = snapshot.clone();
                self.emit(Event::Count(snapshot)).await;
            }
            RoutedEvent::Chat(entry) => self.emit(Event::Chat(entry)).await,
            RoutedEvent::Recovery(entries) => {
                tracing::debug!(lines = entries.len(), "chat history recovered");
                self.emit(Event::Recovery(entries)).await;
            }
        }
    }

    async fn emit(&mut self, event: Event) {
        let _ = self.event_tx.send(event).await;
    }

    fn publish(&self) {
        let mut status = self.status.lock();
        status.state = self.machine.state();
        status.identity = self.machine.identity().clone();
    }
}

async fn poll_pending(pending: &mut Option<PendingConnect>) -> Result<Connection, TransportError> {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(link: &mut Option<Connection>) -> Option<Result<String, TransportError>> {
    match link {
        Some(conn) => conn.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<Interval>) -> Instant {
    match timer {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
