mod client;
mod error;
mod msg;
pub mod profile;
mod room;
mod ws;

use axum::{routing::get, Router};

use crate::{config::QueueSizes, registry::Rooms, rules::Rules, AppResult, AppState};

pub use client::Client;
pub use error::JoinError;
pub use msg::{render, try_render, RENDER_FALLBACK};
pub use room::{ClientHandle, RegisterRequest, Room, RoomHandle, UnregisterRequest};

/// The lobby every session starts in.
pub const DEFAULT_ROOM: &str = "main";

pub const LOBBY_WELCOME: &str = "welcome to parlour.
 - messages are disabled in the main lobby
 - please use /start or /join to start chatting
 - you can run /help for a list of commands";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::room_ws))
}

/// Registers a new room under `name` and starts its actor.
pub fn spawn_room(rooms: &Rooms, name: &str, rules: Rules, queues: QueueSizes) -> Result<RoomHandle, JoinError> {
    let (room, handle) = Room::new(name, rules, rooms.clone(), queues);
    if !rooms.create(name, handle.clone()) {
        return Err(JoinError::AlreadyExists(name.to_owned()));
    }

    tokio::spawn(room.run());
    Ok(handle)
}

pub fn open_lobby(rooms: &Rooms, queues: QueueSizes) -> AppResult<RoomHandle> {
    let rules = Rules::new()
        .keep_open()
        .no_commands()
        .no_messages()
        .welcome_message(LOBBY_WELCOME);

    Ok(spawn_room(rooms, DEFAULT_ROOM, rules, queues)?)
}
