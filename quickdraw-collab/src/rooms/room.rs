use chrono::{DateTime, SubsecRound, Utc};

use crate::{PrimaryKey, RoomData, StateMap};

pub type RoomId = PrimaryKey;

/// Prefix of the shared state keys a non-owner member may write.
/// A member owns exactly the key `~<their id>`.
pub const PLAYER_PARTITION_PREFIX: char = '~';

/// Returns the shared state key reserved for the given player
pub fn player_partition_key(user_id: &str) -> String {
    format!("{PLAYER_PARTITION_PREFIX}{user_id}")
}

/// Current time at the precision the database keeps
pub fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A modification time that is never before `previous`
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    timestamp().max(previous)
}

impl RoomData {
    /// Creates a new, open room with no members yet
    pub fn new(id: RoomId, owner_id: PrimaryKey) -> Self {
        let now = timestamp();

        Self {
            id,
            owner_id,
            turn_player_id: None,
            frozen: false,
            created_at: now,
            updated_at: now,
            state: StateMap::new(),
            players: vec![],
        }
    }

    /// Merges `partial` into the shared state on behalf of `user_id`.
    ///
    /// The owner may write any key. Other members only get their own partition
    /// key applied, everything else is dropped. Returns true if any value
    /// actually changed.
    pub fn merge_state(&mut self, user_id: &str, partial: StateMap) -> bool {
        let is_owner = self.is_owner(user_id);
        let partition = player_partition_key(user_id);
        let mut changed = false;

        for (key, value) in partial {
            if !is_owner && key != partition {
                continue;
            }

            if self.state.get(&key) != Some(&value) {
                self.state.insert(key, value);
                changed = true;
            }
        }

        changed
    }

    /// Freezes the room and hands the turn to the owner.
    /// Returns false if the room was already frozen with the owner holding the turn.
    pub fn freeze(&mut self) -> bool {
        if self.frozen && self.turn_player_id.as_deref() == Some(self.owner_id.as_str()) {
            return false;
        }

        self.frozen = true;
        self.turn_player_id = Some(self.owner_id.clone());

        true
    }

    pub fn touch(&mut self) {
        self.updated_at = next_timestamp(self.updated_at);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{PlayerData, UserData};

    fn room_with_members() -> RoomData {
        let mut room = RoomData::new("ROOM1".into(), "A".into());

        for id in ["A", "B"] {
            let user = UserData {
                id: id.into(),
                display_name: id.into(),
            };
            room.players.push(PlayerData::new(user, "ROOM1"));
        }

        room
    }

    fn state(value: serde_json::Value) -> StateMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_owner_writes_any_key() {
        let mut room = room_with_members();

        let changed = room.merge_state("A", state(json!({ "score": 1, "~B": "x" })));

        assert!(changed);
        assert_eq!(room.state, state(json!({ "score": 1, "~B": "x" })));
    }

    #[test]
    fn test_member_only_writes_own_partition() {
        let mut room = room_with_members();
        room.merge_state("A", state(json!({ "score": 1 })));

        let changed = room.merge_state("B", state(json!({ "score": 2, "~B": "ready", "~A": 0 })));

        assert!(changed);
        assert_eq!(room.state, state(json!({ "score": 1, "~B": "ready" })));
    }

    #[test]
    fn test_member_partition_is_exact() {
        let mut room = room_with_members();

        let changed = room.merge_state("B", state(json!({ "~Bob": 1, "~B.extra": 2 })));

        assert!(!changed);
        assert!(room.state.is_empty());
    }

    #[test]
    fn test_unchanged_values_are_not_a_change() {
        let mut room = room_with_members();
        room.merge_state("A", state(json!({ "score": 1, "round": [1, 2] })));

        assert!(!room.merge_state("A", state(json!({ "score": 1, "round": [1, 2] }))));
        assert!(!room.merge_state("A", StateMap::new()));
    }

    #[test]
    fn test_freeze_always_hands_turn_to_owner() {
        let mut room = room_with_members();
        room.turn_player_id = Some("B".into());

        assert!(room.freeze());
        assert_eq!(room.turn_player_id.as_deref(), Some("A"));

        room.turn_player_id = Some("B".into());
        assert!(room.freeze());
        assert!(room.frozen);
        assert_eq!(room.turn_player_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_freeze_is_unchanged_when_owner_has_turn() {
        let mut room = room_with_members();
        room.freeze();

        assert!(!room.freeze());
        assert_eq!(room.turn_player_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_touch_never_goes_backwards() {
        let mut room = room_with_members();
        let future = timestamp() + chrono::Duration::hours(1);
        room.updated_at = future;

        room.touch();

        assert_eq!(room.updated_at, future);
    }
}
