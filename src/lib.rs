pub mod appresult;
pub mod command;
pub mod config;
pub mod message;
pub mod registry;
pub mod res;
pub mod rooms;
pub mod rules;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use config::Config;
use registry::Rooms;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub rooms: Rooms,
    pub config: Arc<Config>,
}

pub fn app(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(res::index))
        .merge(rooms::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
