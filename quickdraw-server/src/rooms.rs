use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json,
};
use chrono::{DateTime, TimeZone, Utc};
use quickdraw_collab::{Freshness, JoinRoom, NewRoom};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::{
    auth::Caller,
    context::ServerContext,
    errors::ServerResult,
    pagination::{PageQuery, Pages, RoomPage},
    schemas::{ChangeTurnSchema, CreateRoomSchema, JoinRoomSchema, SetStateSchema, ValidatedJson},
    serialized::{Room, ToSerialized},
    Router,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RefreshQuery {
    /// Unix seconds of the last time the client fetched the room
    last_refresh_at: Option<String>,
}

impl RefreshQuery {
    /// Anything that isn't a unix timestamp counts as never refreshed
    fn watermark(&self) -> DateTime<Utc> {
        let seconds = self
            .last_refresh_at
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        Utc.timestamp_opt(seconds, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

#[utoipa::path(
    get,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(
        ("id" = String, Path, description = "Room id"),
        RefreshQuery
    ),
    responses(
        (status = 200, body = Room),
        (status = 304, description = "Room hasn't changed since last_refresh_at"),
        (status = 404, description = "Room does not exist")
    )
)]
async fn room(
    State(context): State<ServerContext>,
    Path(room_id): Path<String>,
    Query(query): Query<RefreshQuery>,
) -> ServerResult<Response> {
    let room = context.collab.rooms.get(&room_id, query.watermark()).await?;

    let response = match room {
        Freshness::Modified(room) => Json(room.to_serialized()).into_response(),
        Freshness::NotModified => StatusCode::NOT_MODIFIED.into_response(),
    };

    Ok(response)
}

#[utoipa::path(
    get,
    path = "/v1/rooms",
    tag = "rooms",
    params(PageQuery),
    responses(
        (status = 200, body = RoomPage)
    )
)]
async fn list_rooms(
    State(context): State<ServerContext>,
    Query(query): Query<PageQuery>,
) -> ServerResult<Json<RoomPage>> {
    let rooms = &context.collab.rooms;

    let pages = Pages::new(&query, rooms.count().await?);
    let items = rooms.query(pages.offset(), pages.limit()).await?;

    Ok(Json(pages.with_items(items.to_serialized())))
}

#[utoipa::path(
    post,
    path = "/v1/rooms",
    tag = "rooms",
    request_body = CreateRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 201, body = Room),
        (status = 400, description = "Caller is already in a room"),
        (status = 401, description = "Missing or invalid session")
    )
)]
async fn create_room(
    State(context): State<ServerContext>,
    caller: Caller,
    ValidatedJson(body): ValidatedJson<CreateRoomSchema>,
) -> ServerResult<(StatusCode, Json<Room>)> {
    let room = context
        .collab
        .rooms
        .create(
            caller.user(),
            NewRoom {
                passcode: body.passcode,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(room.to_serialized())))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    request_body = JoinRoomSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 400, description = "Caller is already in this or another room"),
        (status = 403, description = "Room is frozen")
    )
)]
async fn join_room(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<JoinRoomSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .join(
            caller.user(),
            JoinRoom {
                room_id,
                passcode: body.passcode,
            },
        )
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/freeze",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 401, description = "Caller is not the host")
    )
)]
async fn freeze_room(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context.collab.rooms.freeze(caller.user(), &room_id).await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/state",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    request_body = SetStateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 401, description = "Caller is not a member")
    )
)]
async fn set_state(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SetStateSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .set_state(caller.user(), &room_id, body.state)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/player",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    request_body = SetStateSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 404, description = "Caller is not a member")
    )
)]
async fn set_player_state(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<SetStateSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .set_player_state(caller.user(), &room_id, body.state)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/rooms/{id}/turn",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    request_body = ChangeTurnSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room),
        (status = 400, description = "Player already has the turn"),
        (status = 401, description = "Caller is not the host"),
        (status = 404, description = "Player is not in the room")
    )
)]
async fn change_turn(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
    ValidatedJson(body): ValidatedJson<ChangeTurnSchema>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .change_turn(caller.user(), &room_id, &body.turn_player_id)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room id")),
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Room, description = "The room as it was before leaving. Deleted if the caller was the host.")
    )
)]
async fn leave_room(
    State(context): State<ServerContext>,
    caller: Caller,
    Path(room_id): Path<String>,
) -> ServerResult<Json<Room>> {
    let room = context
        .collab
        .rooms
        .leave_room(caller.user(), &room_id)
        .await?;

    Ok(Json(room.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/rooms",
    tag = "rooms",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Caller is no longer in any room")
    )
)]
async fn leave_all_rooms(
    State(context): State<ServerContext>,
    caller: Caller,
) -> ServerResult<Json<serde_json::Value>> {
    context.collab.rooms.leave_all_rooms(caller.user()).await?;

    Ok(Json(json!({})))
}

pub fn router() -> Router {
    Router::new()
        .route(
            "/",
            get(list_rooms).post(create_room).delete(leave_all_rooms),
        )
        .route("/:id", get(room).put(join_room).delete(leave_room))
        .route("/:id/freeze", put(freeze_room))
        .route("/:id/state", put(set_state))
        .route("/:id/player", put(set_player_state))
        .route("/:id/turn", put(change_turn))
}
