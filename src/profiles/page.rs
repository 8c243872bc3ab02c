use std::sync::Arc;

use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;

use crate::{db::PublicProfile, server::ChatServer, session::PeerStatus, AppResult};

#[derive(Deserialize)]
pub(crate) struct PeerQuery {
    sender: String,
}

#[debug_handler]
pub(crate) async fn connected_peers(
    State(server): State<Arc<ChatServer>>,
    Query(PeerQuery { sender }): Query<PeerQuery>,
) -> Json<Vec<PeerStatus>> {
    Json(server.connected_peers(&sender).await)
}

#[debug_handler]
pub(crate) async fn peer_info(
    Path(target): Path<String>,
    State(server): State<Arc<ChatServer>>,
    Query(PeerQuery { sender }): Query<PeerQuery>,
) -> AppResult<Json<PublicProfile>> {
    Ok(Json(server.peer_info(&sender, &target).await?))
}
