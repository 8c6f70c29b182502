//! A single brawl room: membership, Lobby/Active phase and the relay task.
//!
//! All state sits behind one `parking_lot::Mutex` per room. Every operation
//! takes a snapshot of the member handles under the lock and does its sends
//! after releasing it, so a slow peer never blocks other rooms or joins.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{DrainPolicy, RoomSettings};
use crate::directory::UserDirectory;
use crate::error::ApiError;

use super::events;
use super::member::MemberHandle;
use super::relay::{RelayError, RelayQueue};

/// Frame text sent to everyone left behind when the host abandons the lobby.
pub const HOST_ABORTED: &str = "The host aborted the game.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Active,
}

/// Why a connection could not join a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    /// Unknown (or torn down) room and the requester is not a host.
    NotFound,
    /// Identity validation failed.
    Unauthorized,
    Full,
    AlreadyJoined,
    AlreadyActive,
}

impl JoinError {
    /// Text carried by the `error_` frame.
    pub fn message(&self) -> &'static str {
        match self {
            JoinError::NotFound => "The requested brawl does not exist!",
            JoinError::Unauthorized => "You seem to be an unauthorized user. Refresh the page?",
            JoinError::Full => "This brawl is already full!",
            JoinError::AlreadyJoined => "You have already joined this brawl!",
            JoinError::AlreadyActive => "The requested brawl is already in progress!",
        }
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for JoinError {}

/// What a departure did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The user was not (or no longer) a member.
    NotMember,
    /// Others remain and were sent a fresh roster.
    Remaining,
    /// Nobody is left. The room is closed already if the drain policy says so.
    Drained,
    /// The host left the lobby; everyone was kicked and the room is closed.
    Aborted,
}

struct RoomState {
    phase: Phase,
    members: HashMap<String, MemberHandle>,
    closed: bool,
    emptied_at: Option<Instant>,
}

pub struct Room {
    key: String,
    host_id: String,
    capacity: usize,
    drain: DrainPolicy,
    directory: Arc<dyn UserDirectory>,
    queue: RelayQueue,
    state: Mutex<RoomState>,
}

impl Room {
    pub fn new(
        key: impl Into<String>,
        host_id: impl Into<String>,
        settings: &RoomSettings,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            key: key.into(),
            host_id: host_id.into(),
            capacity: settings.capacity,
            drain: settings.drain,
            directory,
            queue: RelayQueue::new(settings.relay_queue_capacity, settings.overflow),
            state: Mutex::new(RoomState {
                phase: Phase::Lobby,
                members: HashMap::new(),
                closed: false,
                emptied_at: None,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn member_count(&self) -> usize {
        self.state.lock().members.len()
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.state.lock().members.contains_key(user_id)
    }

    /// Current member ids, sorted.
    pub fn member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().members.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Pre-upgrade check in the order joiners are told about problems:
    /// already started, then duplicate, then full.
    pub fn admission_check(&self, user_id: &str) -> Result<(), JoinError> {
        let state = self.state.lock();
        if state.closed {
            return Err(JoinError::NotFound);
        }
        if state.phase == Phase::Active {
            return Err(JoinError::AlreadyActive);
        }
        if state.members.contains_key(user_id) {
            return Err(JoinError::AlreadyJoined);
        }
        if state.members.len() >= self.capacity {
            return Err(JoinError::Full);
        }
        Ok(())
    }

    /// Register a member and send everyone the new roster.
    ///
    /// Checks capacity, then uniqueness, then phase; the first failure wins
    /// and leaves membership untouched.
    pub async fn join(&self, user_id: &str, handle: MemberHandle) -> Result<(), JoinError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(JoinError::NotFound);
            }
            if state.members.len() >= self.capacity {
                return Err(JoinError::Full);
            }
            if state.members.contains_key(user_id) {
                return Err(JoinError::AlreadyJoined);
            }
            if state.phase == Phase::Active {
                return Err(JoinError::AlreadyActive);
            }
            state.members.insert(user_id.to_string(), handle);
            state.emptied_at = None;
        }

        tracing::info!(room = %self.key, %user_id, "member joined");
        let _ = self.membership_broadcast().await;
        Ok(())
    }

    /// Remove a member.
    ///
    /// The host leaving the lobby tears the room down: every other member
    /// gets one abort frame and is disconnected. Otherwise the remaining
    /// members get a fresh roster.
    pub async fn leave(&self, user_id: &str) -> LeaveOutcome {
        let (outcome, kicked) = {
            let mut state = self.state.lock();
            if state.members.remove(user_id).is_none() {
                return LeaveOutcome::NotMember;
            }

            if user_id == self.host_id && state.phase == Phase::Lobby {
                state.closed = true;
                let kicked: Vec<MemberHandle> =
                    state.members.drain().map(|(_, handle)| handle).collect();
                (LeaveOutcome::Aborted, kicked)
            } else if state.members.is_empty() {
                state.emptied_at = Some(Instant::now());
                if self.drain == DrainPolicy::Remove {
                    state.closed = true;
                }
                (LeaveOutcome::Drained, Vec::new())
            } else {
                (LeaveOutcome::Remaining, Vec::new())
            }
        };

        tracing::info!(room = %self.key, %user_id, ?outcome, "member left");

        match outcome {
            LeaveOutcome::Aborted => {
                self.queue.close();
                let frame = events::error(HOST_ABORTED);
                for handle in kicked {
                    handle.send_final(frame.clone());
                }
            }
            LeaveOutcome::Drained => {
                if self.is_closed() {
                    self.queue.close();
                }
            }
            LeaveOutcome::Remaining => {
                let _ = self.membership_broadcast().await;
            }
            LeaveOutcome::NotMember => {}
        }

        outcome
    }

    /// Flip Lobby → Active, tell everyone, and start the relay task.
    ///
    /// Returns false (and does nothing) if play already began, the room is
    /// closed, or `sender_id` is not a member.
    pub async fn begin_play(self: &Arc<Self>, sender_id: &str) -> bool {
        let handles = {
            let mut state = self.state.lock();
            if state.closed
                || state.phase == Phase::Active
                || !state.members.contains_key(sender_id)
            {
                return false;
            }
            state.phase = Phase::Active;
            state.members.values().cloned().collect::<Vec<_>>()
        };

        tracing::info!(room = %self.key, %sender_id, "brawl started");

        // Every member has `activate` queued before the first payload can
        // go out. Payloads pushed meanwhile wait in the queue.
        for handle in handles {
            if !handle.send_text(events::ACTIVATE).await {
                tracing::debug!(room = %self.key, conn_id = %handle.conn_id(), "activate send failed");
            }
        }
        tokio::spawn(run_relay(self.clone()));
        true
    }

    /// Queue a payload for every member (sender included).
    pub async fn relay_message(&self, payload: String) -> Result<(), RelayError> {
        if self.phase() != Phase::Active {
            return Err(RelayError::NotActive);
        }
        self.queue.push(payload).await
    }

    /// Send `idList_{id: name}` to every member.
    ///
    /// A failed name lookup skips this broadcast only.
    pub async fn membership_broadcast(&self) -> Result<(), ApiError> {
        let members = self.snapshot();

        let mut names = BTreeMap::new();
        for (user_id, _) in &members {
            match self.directory.resolve_name(user_id).await {
                Ok(name) => {
                    names.insert(user_id.clone(), name);
                }
                Err(e) => {
                    tracing::error!(room = %self.key, %user_id, error = %e, "roster broadcast skipped");
                    return Err(e);
                }
            }
        }

        let frame = events::roster(&names);
        for (user_id, handle) in members {
            if !handle.send_text(frame.clone()).await {
                tracing::debug!(room = %self.key, %user_id, "roster send failed");
            }
        }
        Ok(())
    }

    /// Close the room and hand back whoever was still inside.
    pub(crate) fn shutdown(&self) -> Vec<MemberHandle> {
        let members = {
            let mut state = self.state.lock();
            state.closed = true;
            state.members.drain().map(|(_, handle)| handle).collect()
        };
        self.queue.close();
        members
    }

    /// Close the room if it has been empty for at least `ttl`.
    pub(crate) fn close_if_idle(&self, ttl: Duration) -> bool {
        let expired = {
            let mut state = self.state.lock();
            let expired = state.closed
                || (state.members.is_empty()
                    && state.emptied_at.is_some_and(|at| at.elapsed() >= ttl));
            if expired {
                state.closed = true;
            }
            expired
        };
        if expired {
            self.queue.close();
        }
        expired
    }

    fn snapshot(&self) -> Vec<(String, MemberHandle)> {
        self.state
            .lock()
            .members
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }
}

/// Drain the room's queue until it closes, delivering each payload to every
/// member present at delivery time.
async fn run_relay(room: Arc<Room>) {
    tracing::debug!(room = %room.key, "relay task started");

    while let Some(payload) = room.queue.pop().await {
        for (user_id, handle) in room.snapshot() {
            if !handle.send_text(payload.clone()).await {
                tracing::debug!(room = %room.key, %user_id, "relay send failed");
            }
        }
    }

    tracing::debug!(room = %room.key, "relay task stopped");
}
