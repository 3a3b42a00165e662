use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{health, pagination, rooms, schemas, serialized};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck,
        rooms::room,
        rooms::list_rooms,
        rooms::create_room,
        rooms::join_room,
        rooms::freeze_room,
        rooms::set_state,
        rooms::set_player_state,
        rooms::change_turn,
        rooms::leave_room,
        rooms::leave_all_rooms,
    ),
    components(schemas(
        serialized::Room,
        serialized::Player,
        serialized::RoomListing,
        pagination::RoomPage,
        schemas::CreateRoomSchema,
        schemas::JoinRoomSchema,
        schemas::SetStateSchema,
        schemas::ChangeTurnSchema,
    )),
    modifiers(&Security),
    info(
        description = "quickdraw-server exposes endpoints to create, join and play in quickdraw rooms"
    )
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
