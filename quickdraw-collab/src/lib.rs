mod auth;
mod db;
mod rooms;
mod util;

use std::sync::Arc;

pub use auth::*;
pub use db::*;
pub use rooms::*;

/// The quickdraw collab system, facilitating room management and authentication.
pub struct Collab {
    database: Arc<dyn Database>,

    pub auth: Auth,
    pub rooms: RoomManager,
}

/// A type passed to various components of the collab system, to access shared capabilities.
#[derive(Clone)]
pub struct CollabContext {
    pub database: Arc<dyn Database>,
    pub room_ids: Arc<dyn RoomIdGenerator>,
}

impl Collab {
    pub fn new<Db>(database: Db) -> Self
    where
        Db: Database + 'static,
    {
        Self::with_room_ids(database, RandomRoomIds)
    }

    /// Creates the collab system with a custom source of room ids
    pub fn with_room_ids<Db, G>(database: Db, room_ids: G) -> Self
    where
        Db: Database + 'static,
        G: RoomIdGenerator + 'static,
    {
        let database: Arc<dyn Database> = Arc::new(database);

        let context = CollabContext {
            database: database.clone(),
            room_ids: Arc::new(room_ids),
        };

        Self {
            auth: Auth::new(&database),
            rooms: RoomManager::new(&context),
            database,
        }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }
}
