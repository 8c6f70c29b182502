//! Per-room bounded relay queue.
//!
//! Connections push `data` payloads; the room's single relay task pops them
//! and fans each one out to every member. What happens when the queue is full
//! is decided by the configured [`OverflowPolicy`].

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::OverflowPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// Queue at capacity under `OverflowPolicy::Reject`.
    Full,
    /// The room was torn down.
    Closed,
    /// Play has not begun; the room has no relay task yet.
    NotActive,
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RelayError::Full => "relay queue is full",
            RelayError::Closed => "relay queue is closed",
            RelayError::NotActive => "room is not active",
        };
        f.write_str(reason)
    }
}

impl std::error::Error for RelayError {}

struct QueueState {
    items: VecDeque<String>,
    closed: bool,
    dropped: u64,
}

pub struct RelayQueue {
    state: Mutex<QueueState>,
    capacity: usize,
    policy: OverflowPolicy,
    readable: Notify,
    writable: Notify,
}

impl RelayQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
                dropped: 0,
            }),
            capacity,
            policy,
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Enqueue a payload, applying the overflow policy when full.
    pub async fn push(&self, payload: String) -> Result<(), RelayError> {
        loop {
            // Register before checking so a pop between the check and the
            // await still wakes us.
            let writable = self.writable.notified();
            tokio::pin!(writable);
            writable.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(RelayError::Closed);
                }

                if state.items.len() < self.capacity {
                    state.items.push_back(payload);
                    drop(state);
                    self.readable.notify_one();
                    return Ok(());
                }

                match self.policy {
                    OverflowPolicy::Reject => return Err(RelayError::Full),
                    OverflowPolicy::DropOldest => {
                        state.items.pop_front();
                        state.items.push_back(payload);
                        state.dropped += 1;
                        let dropped = state.dropped;
                        drop(state);
                        tracing::warn!(dropped, "relay queue full, dropped oldest payload");
                        self.readable.notify_one();
                        return Ok(());
                    }
                    OverflowPolicy::Block => {}
                }
            }

            writable.await;
        }
    }

    /// Wait for the next payload. `None` once the queue is closed.
    pub async fn pop(&self) -> Option<String> {
        loop {
            let readable = self.readable.notified();
            tokio::pin!(readable);
            readable.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return None;
                }
                if let Some(payload) = state.items.pop_front() {
                    drop(state);
                    self.writable.notify_one();
                    return Some(payload);
                }
            }

            readable.await;
        }
    }

    /// Close the queue, discarding anything still buffered and waking every
    /// blocked producer and the consumer.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.items.clear();
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }
}
