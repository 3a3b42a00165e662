mod freshness;
mod id;
mod room;

use chrono::{DateTime, Utc};
use log::{info, warn};
use thiserror::Error;

use crate::{CollabContext, DatabaseError, PlayerData, RoomData, RoomSummaryData, StateMap, UserData};

pub use freshness::*;
pub use id::*;
pub use room::*;

/// Coordinates room membership, turns and state on behalf of callers.
///
/// Every operation that needs to know who is calling takes the caller as an
/// `Option`, so an absent identity is answered with [RoomError::Unauthorized].
pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(DatabaseError),
}

impl From<DatabaseError> for RoomError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            e @ DatabaseError::Forbidden { .. } => Self::Forbidden(e.to_string()),
            e @ DatabaseError::Conflict { .. } => Self::Conflict(e.to_string()),
            e => Self::StorageUnavailable(e),
        }
    }
}

pub type RoomResult<T> = Result<T, RoomError>;

/// Input for creating a room.
///
/// TODO: store a hash of the passcode and check it in [RoomManager::join].
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub passcode: String,
}

/// Input for joining a room
#[derive(Debug, Clone)]
pub struct JoinRoom {
    pub room_id: RoomId,
    pub passcode: String,
}

fn authenticated(caller: Option<&UserData>) -> RoomResult<&UserData> {
    caller.ok_or(RoomError::Unauthorized("Missing identity"))
}

fn ensure_owner(room: &RoomData, caller: &UserData) -> RoomResult<()> {
    if room.is_owner(&caller.id) {
        Ok(())
    } else {
        Err(RoomError::Unauthorized("Not room host"))
    }
}

impl RoomManager {
    /// How many generated ids are tried before giving up on creating a room
    pub const MAX_ID_ATTEMPTS: usize = 5;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    async fn room(&self, room_id: &str) -> RoomResult<RoomData> {
        Ok(self.context.database.room_by_id(room_id).await?)
    }

    /// Returns the room, unless it hasn't changed since `watermark`
    pub async fn get(
        &self,
        room_id: &str,
        watermark: DateTime<Utc>,
    ) -> RoomResult<Freshness<RoomData>> {
        let room = self.room(room_id).await?;
        let updated_at = room.updated_at;

        Ok(Freshness::check(room, updated_at, watermark))
    }

    /// Lists rooms ordered by id
    pub async fn query(&self, offset: usize, limit: usize) -> RoomResult<Vec<RoomSummaryData>> {
        Ok(self.context.database.list_rooms(offset, limit).await?)
    }

    pub async fn count(&self) -> RoomResult<usize> {
        Ok(self.context.database.count_rooms().await?)
    }

    /// Creates a new room with the caller as owner and only member
    pub async fn create(&self, caller: Option<&UserData>, _new_room: NewRoom) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let database = &self.context.database;

        if let Some(other_room) = database.room_by_member(&caller.id).await? {
            return Err(RoomError::BadRequest(format!(
                "cannot create multiple rooms, previous room ID: {}",
                other_room.id
            )));
        }

        for _ in 0..Self::MAX_ID_ATTEMPTS {
            let room_id = self.context.room_ids.generate();
            let room = RoomData::new(room_id.clone(), caller.id.clone());

            match database.create_room(room, caller.clone()).await {
                Ok(()) => {
                    info!("Room {} created by {}", room_id, caller.display_name);
                    return self.room(&room_id).await;
                }
                Err(e) if e.is_conflict_on("room", "id") => {
                    warn!("Generated room id {} is taken, trying another", room_id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RoomError::Conflict(
            "could not generate a free room id".to_string(),
        ))
    }

    /// Adds the caller to an open room
    pub async fn join(&self, caller: Option<&UserData>, join: JoinRoom) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let room = self.room(&join.room_id).await?;

        if room.is_member(&caller.id) {
            return Err(RoomError::BadRequest("Already joined".to_string()));
        }

        if let Some(other_room) = self.context.database.room_by_member(&caller.id).await? {
            return Err(RoomError::BadRequest(format!(
                "already a member of room {}",
                other_room.id
            )));
        }

        self.context
            .database
            .add_member(
                &room.id,
                PlayerData::new(caller.clone(), &room.id),
                next_timestamp(room.updated_at),
            )
            .await?;

        info!("{} joined room {}", caller.display_name, room.id);

        self.room(&room.id).await
    }

    /// Freezes the room so nobody else can join, and gives the owner the first turn
    pub async fn freeze(&self, caller: Option<&UserData>, room_id: &str) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let mut room = self.room(room_id).await?;
        ensure_owner(&room, caller)?;

        let loaded_at = room.updated_at;
        if !room.freeze() {
            return Ok(room);
        }

        room.touch();
        self.context.database.update_room(&room, loaded_at).await?;

        info!("Room {} frozen", room.id);

        Ok(room)
    }

    /// Merges a partial state into the shared state of the room.
    ///
    /// Nothing is written if no value changes.
    pub async fn set_state(
        &self,
        caller: Option<&UserData>,
        room_id: &str,
        partial: StateMap,
    ) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let mut room = self.room(room_id).await?;

        if !room.is_member(&caller.id) {
            return Err(RoomError::Unauthorized("Not a room member"));
        }

        let loaded_at = room.updated_at;
        if !room.merge_state(&caller.id, partial) {
            return Ok(room);
        }

        room.touch();
        self.context.database.update_room(&room, loaded_at).await?;

        Ok(room)
    }

    /// Replaces the caller's own per-player state
    pub async fn set_player_state(
        &self,
        caller: Option<&UserData>,
        room_id: &str,
        state: StateMap,
    ) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let room = self.room(room_id).await?;

        self.context
            .database
            .set_player_state(&room.id, &caller.id, state, next_timestamp(room.updated_at))
            .await?;

        self.room(&room.id).await
    }

    /// Hands the turn to another member
    pub async fn change_turn(
        &self,
        caller: Option<&UserData>,
        room_id: &str,
        turn_player_id: &str,
    ) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let mut room = self.room(room_id).await?;
        ensure_owner(&room, caller)?;

        if room.turn_player_id.as_deref() == Some(turn_player_id) {
            return Err(RoomError::BadRequest(
                "cannot change turn to current player".to_string(),
            ));
        }

        if !room.is_member(turn_player_id) {
            return Err(RoomError::NotFound {
                resource: "player",
                identifier: "turn_player_id",
            });
        }

        let loaded_at = room.updated_at;
        room.turn_player_id = Some(turn_player_id.to_string());
        room.touch();
        self.context.database.update_room(&room, loaded_at).await?;

        info!("Room {} turn changed to {}", room.id, turn_player_id);

        Ok(room)
    }

    /// Removes the caller from the room. If the caller owns it, the room is deleted.
    ///
    /// Returns the room as it was right before.
    pub async fn leave_room(&self, caller: Option<&UserData>, room_id: &str) -> RoomResult<RoomData> {
        let caller = authenticated(caller)?;
        let room = self.room(room_id).await?;
        let database = &self.context.database;

        if room.is_owner(&caller.id) {
            database.delete_room(&room.id).await?;
            info!("Room {} deleted by its owner", room.id);
        } else {
            database
                .remove_member(&room.id, &caller.id, next_timestamp(room.updated_at))
                .await?;
            info!("{} left room {}", caller.display_name, room.id);
        }

        Ok(room)
    }

    /// Leaves whichever room the caller is in, if any
    pub async fn leave_all_rooms(&self, caller: Option<&UserData>) -> RoomResult<Option<RoomData>> {
        let caller = authenticated(caller)?;

        match self.context.database.room_by_member(&caller.id).await? {
            Some(room) => self.leave_room(Some(caller), &room.id).await.map(Some),
            None => Ok(None),
        }
    }
}
