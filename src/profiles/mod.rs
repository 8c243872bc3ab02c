mod page;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/peers", get(page::connected_peers))
        .route("/peers/{target}", get(page::peer_info))
}
