use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};

use crate::{db::Account, server::{AuthResult, ChatServer}, AppResult};

#[debug_handler]
pub(crate) async fn register(
    State(server): State<Arc<ChatServer>>,
    Json(account): Json<Account>,
) -> AppResult<Json<AuthResult>> {
    Ok(Json(server.register(account).await?))
}
