//! Read-side endpoints over interviews and their feedback. Store failures
//! degrade to empty results; the client renders an empty state.

use crate::db::{self, Feedback, Interview};
use crate::domain::models::display_interview_type;
use crate::state::SharedState;
use crate::web::session::UserSession;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_LATEST_LIMIT: i64 = 20;
const MAX_LATEST_LIMIT: i64 = 100;

/// An interview as the client renders it: the stored record plus the
/// normalized type label ("mixed" in any casing displays as "Mixed").
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewView {
    #[serde(flatten)]
    pub interview: Interview,
    pub normalized_type: String,
}

impl From<Interview> for InterviewView {
    fn from(interview: Interview) -> Self {
        let normalized_type = display_interview_type(&interview.kind);
        Self {
            interview,
            normalized_type,
        }
    }
}

#[derive(Deserialize)]
pub struct LatestParams {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub user_interviews: Vec<InterviewView>,
    pub latest_interviews: Vec<InterviewView>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_mine))
        .route("/latest", get(latest))
        .route("/:id", get(by_id))
        .route("/:id/feedback", get(feedback_lookup))
        .with_state(state)
}

pub fn home_router(state: SharedState) -> Router {
    Router::new().route("/", get(home)).with_state(state)
}

async fn list_mine(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Json<Vec<InterviewView>> {
    let interviews = db::interviews_by_user(&state.pool, user_id).await;
    Json(interviews.into_iter().map(InterviewView::from).collect())
}

async fn latest(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Query(params): Query<LatestParams>,
) -> Json<Vec<InterviewView>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LATEST_LIMIT)
        .clamp(1, MAX_LATEST_LIMIT);
    let interviews = db::latest_interviews(&state.pool, user_id, limit).await;
    Json(interviews.into_iter().map(InterviewView::from).collect())
}

async fn by_id(
    UserSession(_user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewView>, StatusCode> {
    match db::interview_by_id(&state.pool, id).await {
        Some(interview) => Ok(Json(InterviewView::from(interview))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// The caller's feedback for one interview; `null` when none exists yet.
async fn feedback_lookup(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Json<Option<Feedback>> {
    Json(db::feedback_for_interview(&state.pool, id, user_id).await)
}

/// Both home-view lists in one round trip.
async fn home(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
) -> Json<HomeView> {
    let (user_interviews, latest_interviews) = futures::join!(
        db::interviews_by_user(&state.pool, user_id),
        db::latest_interviews(&state.pool, user_id, DEFAULT_LATEST_LIMIT),
    );

    Json(HomeView {
        user_interviews: user_interviews.into_iter().map(InterviewView::from).collect(),
        latest_interviews: latest_interviews
            .into_iter()
            .map(InterviewView::from)
            .collect(),
    })
}
