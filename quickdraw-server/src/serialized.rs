//! All schemas that are exposed from endpoints are defined here
//! along with the From<T> impls

use chrono::{DateTime, Utc};
use quickdraw_collab::{PlayerData, RoomData, RoomSummaryData, StateMap, UserData};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct Room {
    id: String,
    owner_id: String,
    turn_player_id: Option<String>,
    frozen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    state: StateMap,
    players: Vec<Player>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Player {
    id: String,
    name: String,
    #[schema(value_type = Object)]
    state: StateMap,
}

/// A room as it appears in listings, without shared state or other members
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomListing {
    id: String,
    owner_id: String,
    frozen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    players: Vec<Player>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            turn_player_id: self.turn_player_id.clone(),
            frozen: self.frozen,
            created_at: self.created_at,
            updated_at: self.updated_at,
            state: self.state.clone(),
            players: self.players.to_serialized(),
        }
    }
}

impl ToSerialized<Player> for PlayerData {
    fn to_serialized(&self) -> Player {
        Player {
            id: self.user.id.clone(),
            name: self.user.display_name.clone(),
            state: self.state.clone(),
        }
    }
}

impl ToSerialized<Player> for UserData {
    fn to_serialized(&self) -> Player {
        Player {
            id: self.id.clone(),
            name: self.display_name.clone(),
            state: StateMap::new(),
        }
    }
}

impl ToSerialized<RoomListing> for RoomSummaryData {
    fn to_serialized(&self) -> RoomListing {
        RoomListing {
            id: self.id.clone(),
            owner_id: self.owner.id.clone(),
            frozen: self.frozen,
            created_at: self.created_at,
            updated_at: self.updated_at,
            players: vec![self.owner.to_serialized()],
        }
    }
}
