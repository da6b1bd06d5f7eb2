//! HTTP handlers. Thin glue: deserialize, call the engine, serialize.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::catalog;
use crate::engine::RoomEngine;
use crate::error::AppError;
use crate::types::{ActionInput, CreateRoomInput, GameSummary, JoinRoomInput, RoomView};

/// GET /api/games
pub async fn list_games() -> Json<Vec<GameSummary>> {
    Json(catalog::list_games())
}

/// POST /api/rooms/create
pub async fn create_room(
    State(engine): State<Arc<RoomEngine>>,
    Json(input): Json<CreateRoomInput>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(engine.create_room(input).await?))
}

/// POST /api/rooms/join
pub async fn join_room(
    State(engine): State<Arc<RoomEngine>>,
    Json(input): Json<JoinRoomInput>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(engine.join_room(input).await?))
}

/// POST /api/rooms/{code}/action
pub async fn room_action(
    State(engine): State<Arc<RoomEngine>>,
    Path(code): Path<String>,
    Json(input): Json<ActionInput>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(engine.perform_action(&code, input).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQuery {
    pub session_id: String,
    #[serde(default)]
    pub since_version: i64,
}

/// GET /api/rooms/{code}/sync?sessionId=...&sinceVersion=N
///
/// Long-polls until the room moves past `sinceVersion` or the bounded wait
/// elapses; always answers with the caller's current view.
pub async fn sync_room(
    State(engine): State<Arc<RoomEngine>>,
    Path(code): Path<String>,
    Query(query): Query<SyncQuery>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(
        engine
            .sync(&code, &query.session_id, query.since_version)
            .await?,
    ))
}
