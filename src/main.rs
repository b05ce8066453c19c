use std::{net::SocketAddr, sync::Arc};

use parlour::{
    config::Config,
    message::RoomMessage,
    registry::Rooms,
    rooms, AppResult, AppState,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with_target(false)
        .init();

    let config = Arc::new(Config::from_env()?);

    let rooms = Rooms::new();
    rooms::open_lobby(&rooms, config.queues)?;

    let app_state = AppState {
        rooms: rooms.clone(),
        config: config.clone(),
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, "listening");

    axum::serve(
        listener,
        parlour::app(app_state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(rooms))
    .await?;

    Ok(())
}

async fn shutdown_signal(rooms: Rooms) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }

    info!("shutting down");
    for room in rooms.handles() {
        let _ = room.broadcast(RoomMessage::notice("server is shutting down")).await;
    }
}
