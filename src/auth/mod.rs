mod login;
mod register;

use axum::{routing::post, Router};

use crate::AppState;

pub use login::LoginRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login::login))
        .route("/register", post(register::register))
}
