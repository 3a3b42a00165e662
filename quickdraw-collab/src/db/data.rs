use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// The type used for identity and room keys in the database.
pub type PrimaryKey = String;

/// An open mapping of keys to arbitrary JSON values.
pub type StateMap = Map<String, Value>;

/// A caller identity, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub id: PrimaryKey,
    pub display_name: String,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: i32,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A quickdraw room
#[derive(Debug, Clone, PartialEq)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// The identity that created the room. Never changes.
    pub owner_id: PrimaryKey,
    /// The member whose turn it is, if the host assigned one
    pub turn_player_id: Option<PrimaryKey>,
    /// Once frozen, nobody else can join
    pub frozen: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Shared state, written by the host and by members in their own partition
    pub state: StateMap,
    pub players: Vec<PlayerData>,
}

/// A member of a room
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerData {
    pub user: UserData,
    pub room_id: PrimaryKey,
    /// State only this player can write
    pub state: StateMap,
}

/// The lightweight projection of a room used in listings.
/// Shared state and non-owner members are left out.
#[derive(Debug, Clone)]
pub struct RoomSummaryData {
    pub id: PrimaryKey,
    pub owner: UserData,
    pub frozen: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomData {
    /// Returns the member if it exists in the room
    pub fn player(&self, user_id: &str) -> Option<&PlayerData> {
        self.players.iter().find(|p| p.user.id == user_id)
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.player(user_id).is_some()
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    pub fn summary(&self) -> Option<RoomSummaryData> {
        let owner = self.player(&self.owner_id)?;

        Some(RoomSummaryData {
            id: self.id.clone(),
            owner: owner.user.clone(),
            frozen: self.frozen,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl PlayerData {
    /// A fresh membership with empty per-player state
    pub fn new(user: UserData, room_id: &str) -> Self {
        Self {
            user,
            room_id: room_id.to_string(),
            state: StateMap::new(),
        }
    }
}
