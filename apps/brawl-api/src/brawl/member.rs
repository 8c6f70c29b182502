//! Per-connection outbound channel owned by a room membership.

use tokio::sync::mpsc;

/// Frames buffered per connection before senders have to wait.
pub const OUTBOUND_CAPACITY: usize = 256;

/// An item for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Send a close frame and stop writing.
    Close,
}

/// Sending side of one member's connection.
///
/// The receiving side is drained by that connection's writer task, so sends
/// never touch the socket directly and never happen under a room lock.
#[derive(Debug, Clone)]
pub struct MemberHandle {
    conn_id: String,
    tx: mpsc::Sender<Outbound>,
}

impl MemberHandle {
    pub fn channel(conn_id: impl Into<String>) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let handle = Self {
            conn_id: conn_id.into(),
            tx,
        };
        (handle, rx)
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Queue a text frame, waiting if the connection is backed up.
    ///
    /// Returns false if the connection's writer is gone.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(Outbound::Text(text.into())).await.is_ok()
    }

    /// Ask the writer to close the connection.
    pub fn kick(&self) {
        match self.tx.try_send(Outbound::Close) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let _ = tx.send(item).await;
                });
            }
        }
    }

    /// Queue a last text frame followed by a close, without waiting.
    ///
    /// If the connection is backed up, both are delivered in order from a
    /// spawned task once it drains.
    pub fn send_final(&self, text: impl Into<String>) {
        match self.tx.try_send(Outbound::Text(text.into())) {
            Ok(()) => self.kick(),
            Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(item).await.is_ok() {
                        let _ = tx.send(Outbound::Close).await;
                    }
                });
            }
        }
    }
}
