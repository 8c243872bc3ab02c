pub mod appresult;
pub mod auth;
pub mod config;
pub mod db;
pub mod profiles;
pub mod reputation;
pub mod rooms;
pub mod server;
pub mod session;

use std::sync::Arc;

use axum::{extract::FromRef, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use appresult::{AppError, AppResult};
use server::ChatServer;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub server: Arc<ChatServer>,
}

pub fn app(server: Arc<ChatServer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(rooms::router())
        .merge(profiles::router())
        .with_state(AppState { server })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}
