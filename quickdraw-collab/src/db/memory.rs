use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, NewSession, PlayerData, Result, RoomData, RoomSummaryData,
    SessionData, StateMap, UserData,
};

/// A database kept entirely in memory.
///
/// Every room operation happens under a single lock, so each call is atomic.
/// Used for tests and when no database url is configured.
#[derive(Default)]
pub struct MemoryDatabase {
    rooms: Mutex<BTreeMap<String, RoomData>>,
    sessions: DashMap<String, SessionData>,
    session_counter: AtomicI32,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn room_not_found() -> DatabaseError {
    DatabaseError::NotFound {
        resource: "room",
        identifier: "id",
    }
}

fn room_frozen() -> DatabaseError {
    DatabaseError::Forbidden {
        resource: "room",
        reason: "frozen",
    }
}

fn touch(room: &mut RoomData, at: DateTime<Utc>) {
    room.updated_at = room.updated_at.max(at);
}

fn member_of<'a>(
    rooms: &'a BTreeMap<String, RoomData>,
    user_id: &str,
) -> Option<&'a RoomData> {
    rooms.values().find(|r| r.is_member(user_id))
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.sessions
            .get(token)
            .filter(|s| s.expires_at > Utc::now())
            .map(|s| s.value().clone())
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        if self.sessions.contains_key(&new_session.token) {
            return Err(DatabaseError::Conflict {
                resource: "session",
                field: "token",
                value: new_session.token,
            });
        }

        let session = SessionData {
            id: self.session_counter.fetch_add(1, Ordering::Relaxed) + 1,
            token: new_session.token,
            expires_at: new_session.expires_at,
            user: new_session.user,
        };

        self.sessions.insert(session.token.clone(), session.clone());

        Ok(session)
    }

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData> {
        self.rooms
            .lock()
            .get(room_id)
            .cloned()
            .ok_or_else(room_not_found)
    }

    async fn room_by_member(&self, user_id: &str) -> Result<Option<RoomData>> {
        Ok(member_of(&self.rooms.lock(), user_id).cloned())
    }

    async fn count_rooms(&self) -> Result<usize> {
        Ok(self.rooms.lock().len())
    }

    async fn list_rooms(&self, offset: usize, limit: usize) -> Result<Vec<RoomSummaryData>> {
        let rooms = self.rooms.lock();

        Ok(rooms
            .values()
            .skip(offset)
            .take(limit)
            .filter_map(RoomData::summary)
            .collect())
    }

    async fn create_room(&self, room: RoomData, owner: UserData) -> Result<()> {
        if !room.players.is_empty() {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "players",
                value: room.players.len().to_string(),
            });
        }

        if room.frozen {
            return Err(room_frozen());
        }

        if room.owner_id != owner.id {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "owner_id",
                value: owner.id,
            });
        }

        let mut rooms = self.rooms.lock();

        if rooms.contains_key(&room.id) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "id",
                value: room.id,
            });
        }

        if member_of(&rooms, &owner.id).is_some() {
            return Err(DatabaseError::Conflict {
                resource: "player",
                field: "id",
                value: owner.id,
            });
        }

        let mut room = room;
        room.players.push(PlayerData::new(owner, &room.id));
        rooms.insert(room.id.clone(), room);

        Ok(())
    }

    async fn update_room(&self, room: &RoomData, expected_updated_at: DateTime<Utc>) -> Result<()> {
        let mut rooms = self.rooms.lock();
        let stored = rooms.get_mut(&room.id).ok_or_else(room_not_found)?;

        if stored.updated_at != expected_updated_at {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "updated_at",
                value: stored.updated_at.to_rfc3339(),
            });
        }

        stored.frozen = room.frozen;
        stored.owner_id = room.owner_id.clone();
        stored.state = room.state.clone();
        stored.turn_player_id = room.turn_player_id.clone();
        stored.created_at = room.created_at;
        stored.updated_at = room.updated_at.max(stored.updated_at);

        Ok(())
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        self.rooms
            .lock()
            .remove(room_id)
            .map(|_| ())
            .ok_or_else(room_not_found)
    }

    async fn add_member(&self, room_id: &str, player: PlayerData, at: DateTime<Utc>) -> Result<()> {
        let mut rooms = self.rooms.lock();

        let room = rooms.get(room_id).ok_or_else(room_not_found)?;
        if room.frozen {
            return Err(room_frozen());
        }

        if member_of(&rooms, &player.user.id).is_some() {
            return Err(DatabaseError::Conflict {
                resource: "player",
                field: "id",
                value: player.user.id,
            });
        }

        let room = rooms.get_mut(room_id).ok_or_else(room_not_found)?;
        room.players.push(PlayerData {
            room_id: room_id.to_string(),
            ..player
        });
        touch(room, at);

        Ok(())
    }

    async fn remove_member(&self, room_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(room_id).ok_or_else(room_not_found)?;

        if room.frozen {
            return Err(room_frozen());
        }

        if room.is_owner(user_id) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "owner_id",
                value: user_id.to_string(),
            });
        }

        let position = room
            .players
            .iter()
            .position(|p| p.user.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "player",
                identifier: "room_id:id",
            })?;

        room.players.remove(position);

        // The turn can't stay with someone who left
        if room.turn_player_id.as_deref() == Some(user_id) {
            room.turn_player_id = Some(room.owner_id.clone());
        }

        touch(room, at);

        Ok(())
    }

    async fn set_player_state(
        &self,
        room_id: &str,
        user_id: &str,
        state: StateMap,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut rooms = self.rooms.lock();
        let room = rooms.get_mut(room_id).ok_or_else(room_not_found)?;

        let player = room
            .players
            .iter_mut()
            .find(|p| p.user.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "player",
                identifier: "room_id:id",
            })?;

        player.state = state;
        touch(room, at);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    fn user(id: &str) -> UserData {
        UserData {
            id: id.to_string(),
            display_name: format!("User {id}"),
        }
    }

    fn new_room(id: &str, owner: &str) -> RoomData {
        let now = Utc::now();

        RoomData {
            id: id.to_string(),
            owner_id: owner.to_string(),
            turn_player_id: None,
            frozen: false,
            created_at: now,
            updated_at: now,
            state: StateMap::new(),
            players: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_room_adds_owner_as_only_member() {
        let db = MemoryDatabase::new();
        let before = db.count_rooms().await.unwrap();

        db.create_room(new_room("XIASD", "1"), user("1")).await.unwrap();

        let room = db.room_by_id("XIASD").await.unwrap();
        assert_eq!(db.count_rooms().await.unwrap() - before, 1);
        assert_eq!(room.players.len(), 1);
        assert!(room.is_member("1"));
    }

    #[tokio::test]
    async fn test_create_room_rejects_preset_members() {
        let db = MemoryDatabase::new();
        let mut room = new_room("XIASD", "1");
        room.players.push(PlayerData::new(user("2"), "XIASD"));

        let result = db.create_room(room, user("1")).await;

        assert!(result.unwrap_err().is_conflict_on("room", "players"));
        assert_eq!(db.count_rooms().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_room_rejects_duplicate_id() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();

        let result = db.create_room(new_room("AAAAA", "2"), user("2")).await;

        assert!(result.unwrap_err().is_conflict_on("room", "id"));
    }

    #[tokio::test]
    async fn test_membership_writes_are_forbidden_when_frozen() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();
        db.add_member("AAAAA", PlayerData::new(user("2"), "AAAAA"), Utc::now())
            .await
            .unwrap();

        let mut room = db.room_by_id("AAAAA").await.unwrap();
        let expected = room.updated_at;
        room.frozen = true;
        db.update_room(&room, expected).await.unwrap();

        let join = db
            .add_member("AAAAA", PlayerData::new(user("3"), "AAAAA"), Utc::now())
            .await;
        let leave = db.remove_member("AAAAA", "2", Utc::now()).await;

        assert!(matches!(join, Err(DatabaseError::Forbidden { .. })));
        assert!(matches!(leave, Err(DatabaseError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_frozen_rooms_cannot_be_created() {
        let db = MemoryDatabase::new();
        let mut room = new_room("AAAAA", "1");
        room.frozen = true;

        let result = db.create_room(room, user("1")).await;

        assert!(matches!(result, Err(DatabaseError::Forbidden { .. })));
        assert_eq!(db.count_rooms().await.unwrap(), 0);
        assert!(db.room_by_member("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_can_only_be_in_one_room() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();
        db.create_room(new_room("BBBBB", "2"), user("2")).await.unwrap();

        let result = db
            .add_member("BBBBB", PlayerData::new(user("1"), "BBBBB"), Utc::now())
            .await;

        assert!(result.unwrap_err().is_conflict_on("player", "id"));
        assert_eq!(db.room_by_member("1").await.unwrap().unwrap().id, "AAAAA");
    }

    #[tokio::test]
    async fn test_update_room_detects_stale_writes() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();

        let room = db.room_by_id("AAAAA").await.unwrap();
        let loaded_at = room.updated_at;

        let mut first = room.clone();
        first.state.insert("score".into(), json!(1));
        first.updated_at = loaded_at + Duration::seconds(1);
        db.update_room(&first, loaded_at).await.unwrap();

        let mut second = room;
        second.frozen = true;
        let result = db.update_room(&second, loaded_at).await;

        assert!(result.unwrap_err().is_conflict_on("room", "updated_at"));
        assert!(!db.room_by_id("AAAAA").await.unwrap().frozen);
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed_as_member() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();

        let result = db.remove_member("AAAAA", "1", Utc::now()).await;

        assert!(result.unwrap_err().is_conflict_on("room", "owner_id"));
    }

    #[tokio::test]
    async fn test_removing_turn_player_hands_turn_to_owner() {
        let db = MemoryDatabase::new();
        db.create_room(new_room("AAAAA", "1"), user("1")).await.unwrap();
        db.add_member("AAAAA", PlayerData::new(user("2"), "AAAAA"), Utc::now())
            .await
            .unwrap();

        let mut room = db.room_by_id("AAAAA").await.unwrap();
        let expected = room.updated_at;
        room.turn_player_id = Some("2".into());
        db.update_room(&room, expected).await.unwrap();

        db.remove_member("AAAAA", "2", Utc::now()).await.unwrap();

        let room = db.room_by_id("AAAAA").await.unwrap();
        assert_eq!(room.turn_player_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_list_rooms_is_ordered_and_paged() {
        let db = MemoryDatabase::new();
        for (id, owner) in [("CCCCC", "3"), ("AAAAA", "1"), ("BBBBB", "2")] {
            db.create_room(new_room(id, owner), user(owner)).await.unwrap();
        }

        let page = db.list_rooms(1, 5).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.id.as_str()).collect();

        assert_eq!(ids, ["BBBBB", "CCCCC"]);
        assert_eq!(page[0].owner.id, "2");
    }

    #[tokio::test]
    async fn test_expired_sessions_are_not_found() {
        let db = MemoryDatabase::new();
        db.create_session(NewSession {
            token: "old".into(),
            user: user("1"),
            expires_at: Utc::now() - Duration::minutes(1),
        })
        .await
        .unwrap();

        assert!(db.session_by_token("old").await.unwrap_err().is_not_found());
    }
}
