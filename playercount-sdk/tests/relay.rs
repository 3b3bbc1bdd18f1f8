//! End-to-end tests against a real WebSocket relay on localhost.
//!
//! Tests cover:
//! - Registration handshake and chat over `ws://`
//! - Recovery and count frames reaching the event channel
//! - Reconnect after the relay closes the connection

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use tokio::sync::mpsc;

use playercount_sdk::client::SessionClient;
use playercount_sdk::config::SessionConfig;
use playercount_sdk::event::Event;
use playercount_sdk::frame::ChatEntry;
use playercount_sdk::identity::{Anonymous, IdentitySource, SharedIdentity};
use playercount_sdk::session::SessionState;
use playercount_sdk::transport::WsConnector;

const RECOVERY: &str = r#"{"header":"recovery","messages":[
    {"username":"alice","message":"first"},
    {"username":"bob","message":"second"}]}"#;

const COUNT: &str = r#"{"header":"count","official_count":42,"count":3,
    "users":[{"username":"alice"}],"positions":[{"x":0.0,"y":90.0}]}"#;

/// Minimal relay: greets every connection, records what clients send, and
/// optionally hangs up on the first connection after its first frame.
#[derive(Clone)]
struct Relay {
    greeting: Vec<&'static str>,
    received: mpsc::UnboundedSender<String>,
    connections: Arc<AtomicUsize>,
    hang_up_first: bool,
}

async fn upgrade(ws: WebSocketUpgrade, State(relay): State<Relay>) -> Response {
    ws.on_upgrade(move |socket| serve_client(socket, relay))
}

async fn serve_client(mut socket: WebSocket, relay: Relay) {
    let index = relay.connections.fetch_add(1, Ordering::SeqCst);
    for frame in &relay.greeting {
        if socket.send(Message::Text((*frame).into())).await.is_err() {
            return;
        }
    }
    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            let _ = relay.received.send(text.as_str().to_owned());
            if relay.hang_up_first && index == 0 {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn spawn_relay(relay: Relay) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", get(upgrade)).with_state(relay);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/")
}

fn relay(
    greeting: Vec<&'static str>,
    hang_up_first: bool,
) -> (Relay, mpsc::UnboundedReceiver<String>) {
    let (received, frames) = mpsc::unbounded_channel();
    let relay = Relay {
        greeting,
        received,
        connections: Arc::new(AtomicUsize::new(0)),
        hang_up_first,
    };
    (relay, frames)
}

fn fast_config(url: String) -> SessionConfig {
    SessionConfig {
        register_interval: 50,
        reconnect_after_close_delay: 200,
        ..SessionConfig::with_url(url)
    }
}

async fn within<T>(fut: impl std::future::Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("timed out waiting on relay")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn handshake_and_chat_over_websocket() {
    init_tracing();
    let (relay, mut frames) = relay(vec![RECOVERY, COUNT], false);
    let url = spawn_relay(relay).await;

    let identity = SharedIdentity::logged_in("carol");
    let (handle, mut events) =
        SessionClient::new(fast_config(url), WsConnector, Arc::new(identity)).spawn();
    handle.start().await.unwrap();

    let mut recovered = None;
    let mut count = None;
    while recovered.is_none() || count.is_none() {
        match within(events.recv()).await.unwrap() {
            Event::Recovery(entries) => recovered = Some(entries),
            Event::Count(snapshot) => count = Some(snapshot),
            _ => {}
        }
    }
    assert_eq!(
        recovered.unwrap(),
        vec![ChatEntry::new("alice", "first"), ChatEntry::new("bob", "second")]
    );
    let count = count.unwrap();
    assert_eq!(count.official_count, 42);
    assert_eq!(count.total_count, 3);
    assert_eq!(handle.snapshot(), count);

    assert_eq!(
        within(frames.recv()).await.unwrap(),
        r#"{"header":"init","logged_in":false,"username":null}"#
    );
    assert_eq!(
        within(frames.recv()).await.unwrap(),
        r#"{"header":"init","logged_in":true,"username":"carol"}"#
    );

    loop {
        if let Event::Registered { identity } = within(events.recv()).await.unwrap() {
            assert_eq!(identity.username.as_deref(), Some("carol"));
            break;
        }
    }
    assert_eq!(handle.state(), SessionState::Registered);

    handle.send_chat("hello relay").await.unwrap();
    assert_eq!(
        within(frames.recv()).await.unwrap(),
        r#"{"header":"chat","message":"hello relay"}"#
    );

    handle.shutdown().await;
}

#[tokio::test]
async fn reconnects_after_relay_hangs_up() {
    init_tracing();
    let (relay, mut frames) = relay(vec![COUNT], true);
    let connections = relay.connections.clone();
    let url = spawn_relay(relay).await;

    let identity: Arc<dyn IdentitySource> = Arc::new(Anonymous);
    let (handle, mut events) = SessionClient::new(fast_config(url), WsConnector, identity).spawn();
    handle.start().await.unwrap();

    // First connection: one anonymous init, then the relay hangs up.
    assert!(within(frames.recv()).await.unwrap().contains(r#""header":"init""#));
    loop {
        if let Event::Disconnected { .. } = within(events.recv()).await.unwrap() {
            break;
        }
    }

    // Second connection comes back on its own and handshakes again.
    assert!(within(frames.recv()).await.unwrap().contains(r#""header":"init""#));
    assert_eq!(connections.load(Ordering::SeqCst), 2);

    handle.shutdown().await;
}

#[tokio::test]
async fn unreachable_relay_keeps_retrying() {
    init_tracing();
    // Bind then drop to get a port nobody is listening on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = fast_config(format!("ws://{addr}/"));
    let (handle, mut events) =
        SessionClient::new(config, WsConnector, Arc::new(Anonymous)).spawn();
    handle.start().await.unwrap();

    let mut failures = 0;
    while failures < 2 {
        if let Event::Disconnected { .. } = within(events.recv()).await.unwrap() {
            failures += 1;
        }
    }
    assert!(!handle.state().is_open());

    handle.shutdown().await;
}
