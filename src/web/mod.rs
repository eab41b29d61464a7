pub mod auth;
pub mod calls;
pub mod feedback;
pub mod generate;
pub mod interviews;
pub mod session;

use crate::state::SharedState;
use axum::{routing::get, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .nest("/api/generate", generate::router(state.clone()))
        .nest("/api/interviews", interviews::router(state.clone()))
        .nest("/api/home", interviews::home_router(state.clone()))
        .nest("/api/feedback", feedback::router(state.clone()))
        .nest("/api/calls", calls::router(state))
}
