//! Client SDK for the editor playercount relay.
//!
//! The relay pushes a snapshot of everyone online (counts, logged-in names
//! and camera directions) plus a shared chat. This crate keeps one session
//! open against it:
//!
//! - [`client`] owns the connection, registration handshake and reconnects
//! - [`router`] decodes inbound frames into typed events
//! - [`chat`] validates outgoing lines and keeps a bounded history
//! - [`transport`] abstracts the socket so tests can run in memory
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use playercount_sdk::{client, config::SessionConfig, event::Event, identity::SharedIdentity};
//!
//! let identity = SharedIdentity::new();
//! let (handle, mut events) = client::connect(SessionConfig::default(), Arc::new(identity.clone()));
//! while let Some(event) = events.recv().await {
//!     if let Event::Count(snapshot) = event {
//!         println!("{} online", snapshot.official_count);
//!     }
//! }
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod client;
pub mod config;
pub mod event;
pub mod frame;
pub mod identity;
pub mod router;
pub mod session;
pub mod transport;

pub use client::{SessionClient, SessionHandle, SessionStatus};
pub use event::Event;
pub use frame::{AngularPosition, ChatEntry, PlayerSnapshot};
