use crate::domain::models::TranscriptEntry;
use crate::services::feedback::{create_feedback, CreateFeedbackResult};
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackRequest {
    pub interview_id: Uuid,
    pub transcript: Vec<TranscriptEntry>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(create))
        .with_state(state)
}

/// Direct feedback creation from a client-supplied transcript. The result is
/// always 200 with a success flag; the caller branches on it.
async fn create(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<CreateFeedbackRequest>,
) -> Json<CreateFeedbackResult> {
    let result = create_feedback(
        &state,
        payload.interview_id,
        user_id,
        &payload.transcript,
    )
    .await;
    Json(result)
}
