#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use brawl_api::config::RoomSettings;
use brawl_api::directory::CachedDirectory;
use brawl_api::AppState;

pub type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Players known to the test directory.
pub const USERS: &[(&str, &str)] = &[
    ("h1", "Host"),
    ("m2", "Mouse"),
    ("m3", "Koi"),
    ("m4", "Fawn"),
    ("p1", "Ant"),
    ("p2", "Bee"),
    ("p3", "Crab"),
    ("p4", "Dove"),
    ("p5", "Eel"),
    ("p6", "Fox"),
    ("p7", "Gnu"),
    ("p8", "Hare"),
    ("p9", "Ibis"),
    ("p10", "Jay"),
    ("p11", "Kiwi"),
    ("p12", "Lark"),
];

/// How long a test waits for any single frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Build an AppState over in-memory users and name cache.
pub fn test_state(settings: RoomSettings) -> AppState {
    let directory = Arc::new(CachedDirectory::in_memory(USERS, 60));
    AppState::new(directory, settings)
}

/// Build the full application router wired to a default test state.
pub fn test_app() -> (Router, AppState) {
    test_app_with(RoomSettings::default())
}

pub fn test_app_with(settings: RoomSettings) -> (Router, AppState) {
    let state = test_state(settings);
    let app = brawl_api::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing.
pub async fn start_server(settings: RoomSettings) -> (SocketAddr, AppState) {
    let (app, state) = test_app_with(settings);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Open a join connection to `/ws/{key}`.
pub async fn connect(addr: SocketAddr, key: &str, uid: &str, is_host: bool) -> Client {
    let url = format!("ws://{addr}/ws/{key}?uid={uid}&isHost={is_host}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Connect and consume `validate`, which the server only delivers once the
/// join has been applied.
pub async fn join(addr: SocketAddr, key: &str, uid: &str, is_host: bool) -> Client {
    let mut ws = connect(addr, key, uid, is_host).await;
    assert_eq!(next_text(&mut ws).await, "validate");
    ws
}

/// Next text frame, skipping ping/pong. Panics on close or timeout.
pub async fn next_text(ws: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return text.as_str().to_string(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected text frame, got {other:?}"),
        }
    }
}

/// Assert the server closes the connection without sending more text.
pub async fn expect_closed(ws: &mut Client) {
    loop {
        let next = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close");
        match next {
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            Some(Ok(other)) => panic!("expected close, got {other:?}"),
        }
    }
}
