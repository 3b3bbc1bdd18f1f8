//! Registration and reconnect state machine.
//!
//! [`SessionMachine`] holds no I/O. Each input returns the actions the driver
//! in [`crate::client`] must perform, in order. Keeping it pure lets every
//! transition be tested without sockets or timers.
//!
//! ```text
//! Disconnected ──start/reconnect──▶ Connecting ──opened──▶ AwaitingHandshake
//!      ▲                                                        │ tick #1: anonymous init
//!      │                                                        │ tick #n: authenticated init
//!      └──────────────closed (from any state)──── Registered ◀──┘
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::frame::OutboundFrame;
use crate::identity::{Identity, IdentitySource};

/// Lifecycle of the single relay connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingHandshake,
    Registered,
}

impl SessionState {
    /// A transport connection is open in this state.
    pub fn is_open(self) -> bool {
        matches!(self, SessionState::AwaitingHandshake | SessionState::Registered)
    }

    pub fn label(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingHandshake => "awaiting handshake",
            SessionState::Registered => "registered",
        }
    }
}

/// Side effects requested by the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Open a new transport connection.
    Connect,
    /// Close the current connection (or abandon the attempt in flight).
    Close,
    Send(OutboundFrame),
    StartRegisterTimer,
    CancelRegisterTimer,
    /// Arm the one-shot reconnect timer.
    ScheduleReconnect(Duration),
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    state: SessionState,
    identity: Identity,
    reconnect_delay: Duration,
    /// First handshake of the current connection has gone out.
    anonymous_sent: bool,
    register_timer_armed: bool,
    reconnect_pending: bool,
}

impl SessionMachine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: SessionState::Disconnected,
            identity: Identity::anonymous(),
            reconnect_delay,
            anonymous_sent: false,
            register_timer_armed: false,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn register_timer_armed(&self) -> bool {
        self.register_timer_armed
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Begin connecting. Any existing connection is torn down first and a
    /// pending reconnect is superseded.
    pub fn start(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state != SessionState::Disconnected {
            self.cancel_register_timer(&mut actions);
            actions.push(Action::Close);
        }
        self.reconnect_pending = false;
        self.state = SessionState::Connecting;
        actions.push(Action::Connect);
        actions
    }

    /// The transport reported open.
    pub fn opened(&mut self) -> Vec<Action> {
        if self.state != SessionState::Connecting {
            return Vec::new();
        }
        self.state = SessionState::AwaitingHandshake;
        self.anonymous_sent = false;
        self.register_timer_armed = true;
        vec![Action::StartRegisterTimer]
    }

    /// One handshake timer tick. The identity source is only consulted once
    /// the first handshake has gone out.
    pub fn tick(&mut self, source: &dyn IdentitySource) -> Vec<Action> {
        if self.state != SessionState::AwaitingHandshake || !self.register_timer_armed {
            return Vec::new();
        }

        if !self.anonymous_sent {
            self.anonymous_sent = true;
            return vec![Action::Send(self.handshake())];
        }

        let Some(username) = source.account() else {
            return Vec::new();
        };
        self.identity.authenticate(username);
        self.state = SessionState::Registered;

        let mut actions = vec![Action::Send(self.handshake())];
        self.cancel_register_timer(&mut actions);
        actions
    }

    /// The transport closed, failed, or never opened.
    pub fn closed(&mut self) -> Vec<Action> {
        if self.state == SessionState::Disconnected {
            return Vec::new();
        }
        let mut actions = Vec::new();
        self.cancel_register_timer(&mut actions);
        self.state = SessionState::Disconnected;
        self.reconnect_pending = true;
        actions.push(Action::ScheduleReconnect(self.reconnect_delay));
        actions
    }

    /// The reconnect timer fired.
    pub fn reconnect_due(&mut self) -> Vec<Action> {
        if self.state != SessionState::Disconnected || !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.state = SessionState::Connecting;
        vec![Action::Connect]
    }

    /// Outbound frame from a collaborator. Dropped unless a connection is open.
    pub fn send(&self, frame: OutboundFrame) -> Vec<Action> {
        if self.state.is_open() {
            vec![Action::Send(frame)]
        } else {
            Vec::new()
        }
    }

    fn handshake(&self) -> OutboundFrame {
        OutboundFrame::Init {
            logged_in: self.identity.logged_in,
            username: self.identity.username.clone(),
        }
    }

    fn cancel_register_timer(&mut self, actions: &mut Vec<Action>) {
        if self.register_timer_armed {
            self.register_timer_armed = false;
            actions.push(Action::CancelRegisterTimer);
        }
    }
}
