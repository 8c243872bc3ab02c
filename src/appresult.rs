use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};

use crate::db::StoreError;

/// Outcome tag carried by every unary reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    AlreadyAuthenticated,
    Unauthenticated,
    DuplicateUsername,
    InvalidInput,
    NotFound,
    AlreadyLiked,
    Internal,
}

impl Status {
    fn http(self) -> StatusCode {
        use Status::*;
        match self {
            Ok | AlreadyLiked => StatusCode::OK,
            AlreadyAuthenticated | DuplicateUsername => StatusCode::CONFLICT,
            Unauthenticated => StatusCode::UNAUTHORIZED,
            InvalidInput => StatusCode::BAD_REQUEST,
            NotFound => StatusCode::NOT_FOUND,
            Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Failed to login as {0}: already logged in from another place!")]
    AlreadyAuthenticated(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("Username {0} is already taken!")]
    DuplicateUsername(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{liker} already liked the message of {target}")]
    AlreadyLiked { liker: String, target: String },
    #[error("account store: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    pub fn status(&self) -> Status {
        use ChatError::*;
        match self {
            AlreadyAuthenticated(_) => Status::AlreadyAuthenticated,
            Unauthenticated(_) => Status::Unauthenticated,
            DuplicateUsername(_) => Status::DuplicateUsername,
            InvalidInput(_) => Status::InvalidInput,
            NotFound(_) => Status::NotFound,
            AlreadyLiked { .. } => Status::AlreadyLiked,
            Store(_) => Status::Internal,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: Status,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self.0.downcast_ref::<ChatError>() {
            Some(err) => (err.status(), err.to_string()),
            None => {
                tracing::error!("internal error: {}\n\n{}", self.0, self.0.backtrace());
                (Status::Internal, self.0.to_string())
            }
        };

        (status.http(), Json(ErrorBody { status, message })).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
