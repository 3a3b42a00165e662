use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists, or a write would break a constraint
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    /// The resource is in a state that does not allow the write
    #[error("{resource} is {reason}")]
    Forbidden {
        resource: &'static str,
        reason: &'static str,
    },
}

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict_on(&self, on_resource: &str, on_field: &str) -> bool {
        matches!(
            self,
            Self::Conflict { resource, field, .. } if *resource == on_resource && *field == on_field
        )
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult<T> {
    /// Turns a not found error into None
    fn optional(self) -> Result<Option<T>>;
}

impl<T> DatabaseResult<T> for Result<T> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Represents a type that can persist quickdraw rooms, members and sessions.
///
/// The `at` arguments on membership writes are the modification time the room
/// is touched with. Implementations never move `updated_at` backwards.
#[async_trait]
pub trait Database: Send + Sync {
    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData>;
    /// Returns the room the user is a member of, if any
    async fn room_by_member(&self, user_id: &str) -> Result<Option<RoomData>>;
    async fn count_rooms(&self) -> Result<usize>;
    /// Lists rooms ordered by id
    async fn list_rooms(&self, offset: usize, limit: usize) -> Result<Vec<RoomSummaryData>>;
    /// Inserts the room and its owner as the only member, atomically.
    /// The room must not carry any members yet.
    async fn create_room(&self, room: RoomData, owner: UserData) -> Result<()>;
    /// Persists the mutable fields of a room. Membership is left untouched.
    /// Fails with a conflict if the stored `updated_at` is not `expected_updated_at`.
    async fn update_room(&self, room: &RoomData, expected_updated_at: DateTime<Utc>)
        -> Result<()>;
    async fn delete_room(&self, room_id: &str) -> Result<()>;
    async fn add_member(&self, room_id: &str, player: PlayerData, at: DateTime<Utc>)
        -> Result<()>;
    async fn remove_member(&self, room_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<()>;
    async fn set_player_state(
        &self,
        room_id: &str,
        user_id: &str,
        state: StateMap,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user: UserData,
    pub expires_at: DateTime<Utc>,
}
