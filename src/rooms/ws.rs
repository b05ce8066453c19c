use std::{net::SocketAddr, sync::Arc};

use axum::{
    debug_handler,
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::WebSocket,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{config::{Config, QueueSizes}, message::RoomMessage, registry::Rooms};

use super::{Client, msg};

#[derive(Deserialize)]
struct Frame {
    message: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(rooms): State<Rooms>,
    State(config): State<Arc<Config>>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let queues = config.queues;
    ws.on_upgrade(move |stream| serve(stream, addr, rooms, queues))
}

async fn serve(stream: WebSocket, addr: SocketAddr, rooms: Rooms, queues: QueueSizes) {
    let (mut sender, mut receiver) = stream.split();
    let (inbound, recv) = mpsc::channel::<String>(queues.client);
    let (send, mut outbound) = mpsc::channel::<RoomMessage>(queues.client);

    let read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Ok(Frame { message }) = serde_json::from_slice(&msg.into_data()) else {
                continue;
            };

            if message.trim().is_empty() {
                continue;
            }

            if inbound.send(message).await.is_err() {
                break;
            }
        }
    });

    let write_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            if sender.send(msg::render(&message).into()).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    Client::new(addr, rooms, queues, send, recv).serve().await;

    read_task.abort();
    let _ = write_task.await;
}
