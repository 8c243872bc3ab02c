mod msg;
mod ws;

use axum::{routing::{get, post}, Router};

use crate::AppState;

pub use msg::{ClientFrame, LikeRequest, PrivateMessageRequest, ServerFrame, SERVER_SENDER};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chat", get(ws::chat_ws))
        .route("/like", post(msg::like))
        .route("/private", post(msg::send_private))
}
