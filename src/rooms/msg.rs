use std::sync::Arc;

use axum::{debug_handler, extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{server::{ChatServer, Receipt}, AppResult};

/// Sender name of every server-originated notice.
pub const SERVER_SENDER: &str = "Server";

/// Frame sent by a client. The first one on a stream declares who is talking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub sender: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub sender: String,
    pub message: String,
    #[serde(default)]
    pub private: bool,
}

impl ServerFrame {
    pub fn system(message: impl Into<String>) -> Self {
        Self {
            sender: SERVER_SENDER.to_owned(),
            message: message.into(),
            private: false,
        }
    }

    pub fn chat(sender: &str, message: &str) -> Self {
        Self {
            sender: sender.to_owned(),
            message: message.to_owned(),
            private: false,
        }
    }

    pub fn private(sender: &str, message: &str) -> Self {
        Self {
            sender: sender.to_owned(),
            message: message.to_owned(),
            private: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikeRequest {
    pub sender: String,
    pub target: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PrivateMessageRequest {
    pub sender: String,
    pub recipient: String,
    pub message: String,
}

#[debug_handler]
pub(crate) async fn like(
    State(server): State<Arc<ChatServer>>,
    Json(LikeRequest { sender, target }): Json<LikeRequest>,
) -> AppResult<Json<Receipt>> {
    Ok(Json(server.like(&sender, &target).await?))
}

#[debug_handler]
pub(crate) async fn send_private(
    State(server): State<Arc<ChatServer>>,
    Json(PrivateMessageRequest { sender, recipient, message }): Json<PrivateMessageRequest>,
) -> AppResult<Json<Receipt>> {
    Ok(Json(server.send_private(&sender, &recipient, &message).await?))
}
