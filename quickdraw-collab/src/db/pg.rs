use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::PgPoolOptions, query, query_as, query_scalar, types::Json, Error as SqlxError,
    FromRow, PgConnection, PgPool,
};

use crate::{
    Database, DatabaseError, IntoDatabaseError, NewSession, PlayerData, Result, RoomData,
    RoomSummaryData, SessionData, StateMap, UserData,
};

/// A postgres database implementation for quickdraw
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct RoomRow {
    id: String,
    owner_id: String,
    turn_player_id: Option<String>,
    frozen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: Json<StateMap>,
}

#[derive(FromRow)]
struct PlayerRow {
    id: String,
    name: String,
    room_id: String,
    state: Json<StateMap>,
}

#[derive(FromRow)]
struct RoomSummaryRow {
    id: String,
    owner_id: String,
    owner_name: String,
    frozen: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: i32,
    token: String,
    user_id: String,
    display_name: String,
    expires_at: DateTime<Utc>,
}

impl From<PlayerRow> for PlayerData {
    fn from(row: PlayerRow) -> Self {
        Self {
            user: UserData {
                id: row.id,
                display_name: row.name,
            },
            room_id: row.room_id,
            state: row.state.0,
        }
    }
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                display_name: row.display_name,
            },
        }
    }
}

impl PgDatabase {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        Ok(Self { pool })
    }

    /// Brings the schema up to date
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))
    }

    async fn room_players(&self, room_id: &str) -> Result<Vec<PlayerData>> {
        let rows = query_as::<_, PlayerRow>(
            "SELECT id, name, room_id, state FROM players WHERE room_id = $1 ORDER BY id",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Loads the room row and locks it for the rest of the transaction
    async fn lock_room(conn: &mut PgConnection, room_id: &str) -> Result<RoomRow> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_one(conn)
            .await
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn touch_room(conn: &mut PgConnection, room_id: &str, at: DateTime<Utc>) -> Result<()> {
        query("UPDATE rooms SET updated_at = GREATEST(updated_at, $1) WHERE id = $2")
            .bind(at)
            .bind(room_id)
            .execute(conn)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

fn room_frozen() -> DatabaseError {
    DatabaseError::Forbidden {
        resource: "room",
        reason: "frozen",
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE token = $1 AND expires_at > timezone('UTC', now())",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "token"))
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        query_as::<_, SessionRow>(
            "INSERT INTO sessions (token, user_id, display_name, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(&new_session.token)
        .bind(&new_session.user.id)
        .bind(&new_session.user.display_name)
        .bind(new_session.expires_at)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or_any("session", "token", &new_session.token))
    }

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData> {
        let row = query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = $1")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "id"))?;

        let players = self.room_players(room_id).await?;

        Ok(RoomData {
            id: row.id,
            owner_id: row.owner_id,
            turn_player_id: row.turn_player_id,
            frozen: row.frozen,
            created_at: row.created_at,
            updated_at: row.updated_at,
            state: row.state.0,
            players,
        })
    }

    async fn room_by_member(&self, user_id: &str) -> Result<Option<RoomData>> {
        let room_id = query_scalar::<_, String>("SELECT room_id FROM players WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.any())?;

        match room_id {
            Some(room_id) => self.room_by_id(&room_id).await.map(Some),
            None => Ok(None),
        }
    }

    async fn count_rooms(&self) -> Result<usize> {
        query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms")
            .fetch_one(&self.pool)
            .await
            .map(|count| count as usize)
            .map_err(|e| e.any())
    }

    async fn list_rooms(&self, offset: usize, limit: usize) -> Result<Vec<RoomSummaryData>> {
        let rows = query_as::<_, RoomSummaryRow>(
            "SELECT
                rooms.id,
                rooms.owner_id,
                players.name AS owner_name,
                rooms.frozen,
                rooms.created_at,
                rooms.updated_at
            FROM rooms
                INNER JOIN players ON players.id = rooms.owner_id AND players.room_id = rooms.id
            ORDER BY rooms.id
            LIMIT $1 OFFSET $2",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows
            .into_iter()
            .map(|row| RoomSummaryData {
                id: row.id,
                owner: UserData {
                    id: row.owner_id,
                    display_name: row.owner_name,
                },
                frozen: row.frozen,
                created_at: row.created_at,
                updated_at: row.updated_at,
            })
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

        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        query(
            "INSERT INTO rooms (id, owner_id, turn_player_id, frozen, created_at, updated_at, state)
            VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&room.id)
        .bind(&room.owner_id)
        .bind(&room.turn_player_id)
        .bind(room.frozen)
        .bind(room.created_at)
        .bind(room.updated_at)
        .bind(Json(&room.state))
        .execute(&mut *tx)
        .await
        .map_err(|e| e.conflict_or_any("room", "id", &room.id))?;

        // Add owner as the first member, in the same transaction
        query("INSERT INTO players (id, name, room_id, state) VALUES ($1, $2, $3, $4)")
            .bind(&owner.id)
            .bind(&owner.display_name)
            .bind(&room.id)
            .bind(Json(StateMap::new()))
            .execute(&mut *tx)
            .await
            .map_err(|e| e.conflict_or_any("player", "id", &owner.id))?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn update_room(&self, room: &RoomData, expected_updated_at: DateTime<Utc>) -> Result<()> {
        let result = query(
            "UPDATE rooms SET
                created_at = $1,
                frozen = $2,
                owner_id = $3,
                state = $4,
                turn_player_id = $5,
                updated_at = GREATEST(updated_at, $6)
            WHERE id = $7 AND updated_at = $8",
        )
        .bind(room.created_at)
        .bind(room.frozen)
        .bind(&room.owner_id)
        .bind(Json(&room.state))
        .bind(&room.turn_player_id)
        .bind(room.updated_at)
        .bind(&room.id)
        .bind(expected_updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // Nothing was written, find out whether the room is gone or was changed underneath
        let current = self.room_by_id(&room.id).await?;

        Err(DatabaseError::Conflict {
            resource: "room",
            field: "updated_at",
            value: current.updated_at.to_rfc3339(),
        })
    }

    async fn delete_room(&self, room_id: &str) -> Result<()> {
        // Members are removed by the cascading foreign key
        let result = query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn add_member(&self, room_id: &str, player: PlayerData, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room = Self::lock_room(&mut tx, room_id).await?;
        if room.frozen {
            return Err(room_frozen());
        }

        query("INSERT INTO players (id, name, room_id, state) VALUES ($1, $2, $3, $4)")
            .bind(&player.user.id)
            .bind(&player.user.display_name)
            .bind(room_id)
            .bind(Json(&player.state))
            .execute(&mut *tx)
            .await
            .map_err(|e| e.conflict_or_any("player", "id", &player.user.id))?;

        Self::touch_room(&mut tx, room_id, at).await?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn remove_member(&self, room_id: &str, user_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        let room = Self::lock_room(&mut tx, room_id).await?;
        if room.frozen {
            return Err(room_frozen());
        }

        if room.owner_id == user_id {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "owner_id",
                value: user_id.to_string(),
            });
        }

        let result = query("DELETE FROM players WHERE id = $1 AND room_id = $2")
            .bind(user_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "player",
                identifier: "room_id:id",
            });
        }

        // The turn can't stay with someone who left
        if room.turn_player_id.as_deref() == Some(user_id) {
            query("UPDATE rooms SET turn_player_id = owner_id WHERE id = $1")
                .bind(room_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| e.any())?;
        }

        Self::touch_room(&mut tx, room_id, at).await?;

        tx.commit().await.map_err(|e| e.any())
    }

    async fn set_player_state(
        &self,
        room_id: &str,
        user_id: &str,
        state: StateMap,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(|e| e.any())?;

        Self::lock_room(&mut tx, room_id).await?;

        let result = query("UPDATE players SET state = $1 WHERE id = $2 AND room_id = $3")
            .bind(Json(&state))
            .bind(user_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "player",
                identifier: "room_id:id",
            });
        }

        Self::touch_room(&mut tx, room_id, at).await?;

        tx.commit().await.map_err(|e| e.any())
    }
}

/// Maps unique violations to a conflict, everything else to an internal error
trait ConflictOrAny {
    fn conflict_or_any(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
}

impl ConflictOrAny for SqlxError {
    fn conflict_or_any(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> DatabaseError {
        match &self {
            SqlxError::Database(e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            _ => self.any(),
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
