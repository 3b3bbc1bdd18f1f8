//! Local identity and the host capability that supplies it.
//!
//! The host environment is polled, never trusted to push: on every handshake
//! tick the session asks its [`IdentitySource`] whether an account is logged
//! in. Nothing here verifies the answer.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Identity announced to the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub logged_in: bool,
    pub username: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Upgrade to an authenticated identity. There is no way back.
    pub fn authenticate(&mut self, username: impl Into<String>) {
        self.logged_in = true;
        self.username = Some(username.into());
    }
}

/// Host capability: report the logged-in account, if any.
pub trait IdentitySource: Send + Sync {
    /// Current account name, or `None` while the user is logged out.
    fn account(&self) -> Option<String>;
}

/// Never reports an account.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentitySource for Anonymous {
    fn account(&self) -> Option<String> {
        None
    }
}

/// Account slot the host fills in whenever it learns who is logged in.
#[derive(Debug, Clone, Default)]
pub struct SharedIdentity {
    account: Arc<Mutex<Option<String>>>,
}

impl SharedIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(username: impl Into<String>) -> Self {
        let identity = Self::new();
        identity.set_account(username);
        identity
    }

    pub fn set_account(&self, username: impl Into<String>) {
        *self.account.lock() = Some(username.into());
    }

    pub fn clear(&self) {
        *self.account.lock() = None;
    }
}

impl IdentitySource for SharedIdentity {
    fn account(&self) -> Option<String> {
        self.account.lock().clone()
    }
}
