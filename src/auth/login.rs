use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{server::{AuthResult, ChatServer}, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[debug_handler]
pub(crate) async fn login(
    State(server): State<Arc<ChatServer>>,
    Json(LoginRequest { username, password }): Json<LoginRequest>,
) -> AppResult<Json<AuthResult>> {
    Ok(Json(server.login(&username, &password).await?))
}
