//! WebSocket join endpoint and per-connection loops.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use gardenia_common::id::connection_id;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time;

use crate::AppState;

use super::events::{self, ClientFrame};
use super::member::{MemberHandle, Outbound};
use super::room::{JoinError, Room};

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

/// Close codes (4000-range for application-level).
const CLOSE_NORMAL: u16 = 1000;
const CLOSE_UNAUTHORIZED: u16 = 4003;
const CLOSE_NOT_FOUND: u16 = 4004;
const CLOSE_CONFLICT: u16 = 4009;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/{key}", get(ws_upgrade))
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    #[serde(default)]
    pub uid: String,
    #[serde(rename = "isHost")]
    pub is_host: Option<String>,
}

impl JoinParams {
    /// Only the literal `"true"` asks to host.
    pub fn wants_host(&self) -> bool {
        self.is_host.as_deref() == Some("true")
    }
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(key): Path<String>,
    Query(params): Query<JoinParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, key, params))
}

async fn handle_connection(socket: WebSocket, state: AppState, key: String, params: JoinParams) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let conn_id = connection_id();
    let uid = params.uid.clone();

    // Step 1: identity.
    if state.rooms.settings().require_known_users {
        let known = match state.directory.validate_user(&uid).await {
            Ok(known) => known,
            Err(e) => {
                tracing::error!(%conn_id, user_id = %uid, error = %e, "identity check failed");
                false
            }
        };
        if !known {
            reject(&mut ws_tx, JoinError::Unauthorized).await;
            return;
        }
    }

    // Step 2: find or create the room, then check it will take us.
    let (room, created) = match state.rooms.get_or_create(&key, params.wants_host(), &uid) {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(room = %key, user_id = %uid, reason = %e, "join refused");
            reject(&mut ws_tx, e).await;
            return;
        }
    };

    if let Err(e) = room.admission_check(&uid) {
        tracing::debug!(room = %key, user_id = %uid, reason = %e, "join refused");
        if created {
            state.rooms.discard_if_unused(&room);
        }
        reject(&mut ws_tx, e).await;
        return;
    }

    // Step 3: join. `validate` goes into the fresh channel first so it
    // precedes the roster that the join broadcasts.
    let (handle, rx) = MemberHandle::channel(conn_id.clone());
    handle.send_text(events::VALIDATE).await;

    if let Err(e) = room.join(&uid, handle).await {
        tracing::debug!(room = %key, user_id = %uid, reason = %e, "join lost a race");
        if created {
            state.rooms.discard_if_unused(&room);
        }
        reject(&mut ws_tx, e).await;
        return;
    }

    tracing::info!(room = %key, user_id = %uid, %conn_id, "connection joined brawl");

    // Step 4: run until the client goes away or the room lets go of us.
    // The room holds the only sender, so the writer also stops once this
    // member is removed.
    let mut writer = tokio::spawn(write_loop(ws_tx, rx));
    let idle_timeout = state.rooms.settings().idle_timeout;

    tokio::select! {
        _ = read_loop(&room, &uid, &mut ws_rx, idle_timeout) => {}
        _ = &mut writer => {
            tracing::debug!(room = %key, user_id = %uid, "writer finished first");
        }
    }

    state.rooms.leave(&room, &uid).await;

    tracing::info!(room = %key, user_id = %uid, %conn_id, "connection left brawl");
}

async fn read_loop(
    room: &Arc<Room>,
    uid: &str,
    ws_rx: &mut WsStream,
    idle_timeout: Option<Duration>,
) {
    loop {
        let next = match idle_timeout {
            Some(limit) => match time::timeout(limit, ws_rx.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::info!(room = %room.key(), user_id = %uid, "idle timeout");
                    return;
                }
            },
            None => ws_rx.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => handle_frame(room, uid, text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(e)) => {
                tracing::debug!(?e, room = %room.key(), user_id = %uid, "ws read error");
                return;
            }
            // Binary is not part of the protocol; ping/pong is answered by axum.
            Some(Ok(_)) => continue,
        }
    }
}

async fn handle_frame(room: &Arc<Room>, uid: &str, raw: &str) {
    match ClientFrame::parse(raw) {
        ClientFrame::Begin => {
            if !room.begin_play(uid).await {
                tracing::debug!(room = %room.key(), user_id = %uid, "begin ignored");
            }
        }
        ClientFrame::Data(payload) => {
            if let Err(e) = room.relay_message(payload.to_string()).await {
                tracing::warn!(room = %room.key(), user_id = %uid, error = %e, "payload dropped");
            }
        }
        ClientFrame::Unknown(tag) => {
            tracing::debug!(room = %room.key(), user_id = %uid, %tag, "unknown frame tag");
        }
    }
}

/// Own the socket sink and drain the member's outbound channel.
async fn write_loop(mut ws_tx: WsSink, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(item) = rx.recv().await {
        match item {
            Outbound::Text(text) => {
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            Outbound::Close => break,
        }
    }
    let _ = send_close(&mut ws_tx, CLOSE_NORMAL, "").await;
}

/// Answer a refused join with one error frame, then close.
async fn reject(ws_tx: &mut WsSink, err: JoinError) {
    let code = match err {
        JoinError::NotFound => CLOSE_NOT_FOUND,
        JoinError::Unauthorized => CLOSE_UNAUTHORIZED,
        JoinError::Full | JoinError::AlreadyJoined | JoinError::AlreadyActive => CLOSE_CONFLICT,
    };
    let frame = events::error(err.message());
    if ws_tx.send(Message::Text(frame.into())).await.is_ok() {
        let _ = send_close(ws_tx, code, err.message()).await;
    }
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> JoinParams {
        serde_json::from_str(query).unwrap()
    }

    #[test]
    fn only_literal_true_requests_host() {
        assert!(params(r#"{"uid":"h1","isHost":"true"}"#).wants_host());
        assert!(!params(r#"{"uid":"h1","isHost":"false"}"#).wants_host());
        assert!(!params(r#"{"uid":"h1","isHost":"TRUE"}"#).wants_host());
        assert!(!params(r#"{"uid":"h1"}"#).wants_host());
    }

    #[test]
    fn uid_defaults_to_empty() {
        assert_eq!(params("{}").uid, "");
    }
}
