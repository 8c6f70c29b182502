//! Process-wide registry of brawl rooms, keyed by the join path.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gardenia_common::{GeneratorExhausted, NameGenerator};

use crate::config::{DrainPolicy, RoomSettings};
use crate::directory::UserDirectory;

use super::room::{JoinError, LeaveOutcome, Phase, Room};

/// Shared registry of all live rooms.
///
/// Uses `DashMap` so that creation and removal are atomic per key without a
/// global lock; each room then serializes its own membership changes.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    settings: RoomSettings,
    directory: Arc<dyn UserDirectory>,
}

impl RoomRegistry {
    pub fn new(settings: RoomSettings, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            rooms: DashMap::new(),
            settings,
            directory,
        }
    }

    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Look up `key`, creating a lobby hosted by `host_id` if it does not
    /// exist and the requester is a host. Returns whether it was created.
    pub fn get_or_create(
        &self,
        key: &str,
        requester_is_host: bool,
        host_id: &str,
    ) -> Result<(Arc<Room>, bool), JoinError> {
        match self.rooms.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok((entry.get().clone(), false)),
            Entry::Vacant(entry) => {
                if !requester_is_host {
                    return Err(JoinError::NotFound);
                }
                let room = Arc::new(Room::new(
                    key,
                    host_id,
                    &self.settings,
                    self.directory.clone(),
                ));
                entry.insert(room.clone());
                tracing::info!(room = %key, %host_id, "brawl created");
                Ok((room, true))
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Room>> {
        self.rooms.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.rooms.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Delete a room and disconnect anyone still in it. Idempotent.
    pub fn remove(&self, key: &str) -> Option<Arc<Room>> {
        let (_, room) = self.rooms.remove(key)?;
        for handle in room.shutdown() {
            handle.kick();
        }
        tracing::info!(room = %key, "brawl removed");
        Some(room)
    }

    /// Run a member's departure and apply what it means for the registry.
    pub async fn leave(&self, room: &Arc<Room>, user_id: &str) -> LeaveOutcome {
        let outcome = room.leave(user_id).await;
        match outcome {
            LeaveOutcome::Aborted => {
                self.unlink(room);
                tracing::info!(room = %room.key(), "host aborted the brawl");
            }
            LeaveOutcome::Drained if self.settings.drain == DrainPolicy::Remove => {
                self.unlink(room);
                tracing::info!(room = %room.key(), "brawl drained");
            }
            _ => {}
        }
        outcome
    }

    /// Drop a room whose creator never made it inside.
    pub fn discard_if_unused(&self, room: &Arc<Room>) -> bool {
        if room.member_count() > 0 || room.phase() != Phase::Lobby {
            return false;
        }
        let removed = self.unlink(room);
        if removed {
            room.shutdown();
            tracing::debug!(room = %room.key(), "discarded unused brawl");
        }
        removed
    }

    /// Remove rooms that have sat empty longer than the configured TTL.
    /// Returns the number of rooms removed.
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.settings.empty_room_ttl;
        let before = self.rooms.len();
        self.rooms.retain(|_, room| !room.close_if_idle(ttl));
        before - self.rooms.len()
    }

    /// A fresh room key that is not currently registered.
    pub fn generate_key(&self, generator: &NameGenerator) -> Result<String, GeneratorExhausted> {
        generator.generate_with(|candidate| self.rooms.contains_key(candidate))
    }

    /// Remove `room`'s entry only if the key still maps to this very room.
    fn unlink(&self, room: &Arc<Room>) -> bool {
        self.rooms
            .remove_if(room.key(), |_, existing| Arc::ptr_eq(existing, room))
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::brawl::member::MemberHandle;
    use crate::directory::CachedDirectory;

    fn registry_with(settings: RoomSettings) -> RoomRegistry {
        let directory = Arc::new(CachedDirectory::in_memory(
            &[("h1", "Host"), ("m2", "Mouse"), ("h2", "Koi")],
            60,
        ));
        RoomRegistry::new(settings, directory)
    }

    fn registry() -> RoomRegistry {
        registry_with(RoomSettings::default())
    }

    async fn join(room: &Room, user_id: &str) {
        // Receivers are leaked on purpose so sends keep succeeding.
        let (handle, rx) = MemberHandle::channel(format!("conn_{user_id}"));
        std::mem::forget(rx);
        room.join(user_id, handle).await.unwrap();
    }

    #[test]
    fn non_host_cannot_create() {
        let registry = registry();
        let err = registry.get_or_create("r2", false, "m2").err();
        assert_eq!(err, Some(JoinError::NotFound));
        assert!(!registry.contains("r2"));
    }

    #[test]
    fn host_creates_then_others_find_it() {
        let registry = registry();
        let (room, created) = registry.get_or_create("r1", true, "h1").unwrap();
        assert!(created);
        assert_eq!(room.host_id(), "h1");
        assert_eq!(room.phase(), Phase::Lobby);

        let (same, created) = registry.get_or_create("r1", false, "m2").unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&room, &same));

        // A second "host" does not replace the first.
        let (same, created) = registry.get_or_create("r1", true, "h2").unwrap();
        assert!(!created);
        assert_eq!(same.host_id(), "h1");
    }

    #[test]
    fn concurrent_creation_yields_one_room() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let (room, created) = registry
                        .get_or_create("race", true, &format!("h{i}"))
                        .unwrap();
                    (room, created)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        let first = &results[0].0;
        assert!(results.iter().all(|(room, _)| Arc::ptr_eq(room, first)));
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = registry();
        registry.get_or_create("r1", true, "h1").unwrap();
        assert!(registry.remove("r1").is_some());
        assert!(registry.remove("r1").is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn host_abort_unregisters_room() {
        let registry = registry();
        let (room, _) = registry.get_or_create("r1", true, "h1").unwrap();
        join(&room, "h1").await;
        join(&room, "m2").await;

        assert_eq!(registry.leave(&room, "h1").await, LeaveOutcome::Aborted);
        assert!(!registry.contains("r1"));
        assert!(matches!(
            registry.get_or_create("r1", false, "m2"),
            Err(JoinError::NotFound)
        ));
    }

    #[tokio::test]
    async fn stale_room_cannot_remove_its_successor() {
        let registry = registry();
        let (old, _) = registry.get_or_create("r1", true, "h1").unwrap();
        join(&old, "h1").await;
        assert_eq!(registry.leave(&old, "h1").await, LeaveOutcome::Aborted);

        let (new, created) = registry.get_or_create("r1", true, "h2").unwrap();
        assert!(created);
        join(&new, "h2").await;

        // A late cleanup against the old room leaves the new one alone.
        assert_eq!(registry.leave(&old, "m2").await, LeaveOutcome::NotMember);
        assert!(!registry.discard_if_unused(&old));
        assert!(Arc::ptr_eq(&registry.get("r1").unwrap(), &new));
    }

    #[tokio::test]
    async fn drained_room_is_removed_under_remove_policy() {
        let registry = registry();
        let (room, _) = registry.get_or_create("r1", true, "h1").unwrap();
        join(&room, "h1").await;
        assert!(room.begin_play("h1").await);

        assert_eq!(registry.leave(&room, "h1").await, LeaveOutcome::Drained);
        assert!(!registry.contains("r1"));
    }

    #[tokio::test]
    async fn lingering_room_is_swept_after_ttl() {
        let settings = RoomSettings {
            drain: DrainPolicy::Linger,
            empty_room_ttl: Duration::ZERO,
            ..RoomSettings::default()
        };
        let registry = registry_with(settings);
        let (room, _) = registry.get_or_create("r1", true, "h1").unwrap();
        join(&room, "h1").await;
        assert!(room.begin_play("h1").await);

        assert_eq!(registry.leave(&room, "h1").await, LeaveOutcome::Drained);
        assert!(registry.contains("r1"));

        // Rooms with members are never swept.
        let (busy, _) = registry.get_or_create("r2", true, "h2").unwrap();
        join(&busy, "h2").await;

        assert_eq!(registry.cleanup_expired(), 1);
        assert!(!registry.contains("r1"));
        assert!(registry.contains("r2"));
        assert!(room.is_closed());
    }

    #[test]
    fn unused_room_is_discarded() {
        let registry = registry();
        let (room, _) = registry.get_or_create("r1", true, "h1").unwrap();
        assert!(registry.discard_if_unused(&room));
        assert!(!registry.contains("r1"));
        assert!(room.is_closed());
    }

    #[test]
    fn generated_keys_avoid_live_rooms() {
        static ONE_ADJ: &[&str] = &["Big"];
        static ONE_NOUN: &[&str] = &["Cat"];
        let registry = registry();
        registry.get_or_create("BigCat", true, "h1").unwrap();

        let generator = NameGenerator::with_vocabulary(ONE_ADJ, ONE_NOUN).with_tiers(1, 2);
        assert_eq!(registry.generate_key(&generator).unwrap(), "BigBigCat");

        registry.get_or_create("BigBigCat", true, "h1").unwrap();
        assert!(registry.generate_key(&generator).is_err());
    }
}
