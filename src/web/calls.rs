//! Interview call sessions: start/stop, status polling, and the webhook the
//! voice collaborator delivers lifecycle events to.

use crate::db;
use crate::domain::models::TranscriptEntry;
use crate::domain::session::{
    plan_exit, CallStatus, ExitPlan, ExitRoute, InterviewSession, SessionMode, Transition,
};
use crate::services::feedback::create_feedback;
use crate::state::SharedState;
use crate::voice::{VoiceEvent, VoiceWebhook};
use crate::web::session::UserSession;
use crate::web::ErrorBody;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", post(start_call))
        .route("/:id", get(call_view))
        .route("/:id/stop", post(stop_call))
        .route("/events", post(voice_webhook))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCallRequest {
    pub mode: SessionMode,
    #[serde(default)]
    pub interview_id: Option<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallView {
    pub session_id: Uuid,
    pub status: CallStatus,
    pub mode: SessionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interview_id: Option<Uuid>,
    pub speaking: bool,
    pub messages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<TranscriptEntry>,
    /// Set once the session is terminal and the exit flow has resolved; the
    /// client navigates on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit: Option<ExitRoute>,
}

impl CallView {
    fn of(session: &InterviewSession) -> Self {
        Self {
            session_id: session.id,
            status: session.status,
            mode: session.mode,
            interview_id: session.interview_id,
            speaking: session.speaking,
            messages: session.transcript.len(),
            last_message: session.last_message().cloned(),
            exit: session.exit,
        }
    }
}

async fn start_call(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Json(payload): Json<StartCallRequest>,
) -> Result<Json<CallView>, (StatusCode, Json<ErrorBody>)> {
    // Configuration gate: without a voice credential and workflow there is no
    // session attempt at all.
    let Some(voice) = state.voice.clone() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new(
                "voice calls are not configured on this server",
            )),
        ));
    };

    let user = db::find_user_by_id(&state.pool, user_id)
        .await
        .ok()
        .flatten()
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("unknown user")),
        ))?;

    let mut variables = serde_json::json!({
        "username": user.name,
        "userid": user_id,
    });

    let interview_id = match payload.mode {
        SessionMode::Generate => None,
        SessionMode::Interview => {
            let Some(interview_id) = payload.interview_id else {
                return Err((
                    StatusCode::BAD_REQUEST,
                    Json(ErrorBody::new("interviewId is required for interview mode")),
                ));
            };
            let Some(interview) = db::interview_by_id(&state.pool, interview_id).await else {
                return Err((
                    StatusCode::NOT_FOUND,
                    Json(ErrorBody::new("interview not found")),
                ));
            };
            let questions: String = interview
                .questions
                .iter()
                .map(|q| format!("- {q}\n"))
                .collect();
            variables["questions"] = serde_json::json!(questions);
            Some(interview_id)
        }
    };

    let target = match payload.mode {
        SessionMode::Generate => voice.workflow_target(),
        SessionMode::Interview => voice.interviewer_target(),
    };

    let provider_call_id = voice.start(&target, variables).await.map_err(|e| {
        tracing::error!("Voice call start failed for user {}: {}", user_id, e);
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody::new("could not start the voice session")),
        )
    })?;

    let mut session = InterviewSession::new(user_id, payload.mode, interview_id);
    session.begin(provider_call_id);
    let view = CallView::of(&session);

    state.calls.write().await.insert(session);
    tracing::info!(
        "Call session {} started for user {} ({:?} mode)",
        view.session_id,
        user_id,
        view.mode
    );

    Ok(Json(view))
}

async fn stop_call(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CallView>, (StatusCode, Json<ErrorBody>)> {
    let (transition, provider_call_id, view) = {
        let mut calls = state.calls.write().await;
        let session = calls.get_mut(&id).ok_or((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("unknown call session")),
        ))?;
        if session.user_id != user_id {
            return Err((
                StatusCode::FORBIDDEN,
                Json(ErrorBody::new("not your call session")),
            ));
        }
        let transition = session.stop();
        (
            transition,
            session.provider_call_id.clone(),
            CallView::of(session),
        )
    };

    match transition {
        Transition::Finished => {
            // The session is already Finished locally; telling the
            // collaborator and generating feedback both happen off the
            // request path.
            if let (Some(voice), Some(call_id)) = (state.voice.clone(), provider_call_id) {
                tokio::spawn(async move {
                    if let Err(e) = voice.stop(&call_id).await {
                        tracing::warn!("Voice stop for call {} failed: {}", call_id, e);
                    }
                });
            }
            tokio::spawn(finalize_session(state.clone(), id));
            Ok(Json(view))
        }
        Transition::Aborted => {
            if let (Some(voice), Some(call_id)) = (state.voice.clone(), provider_call_id) {
                tokio::spawn(async move {
                    let _ = voice.stop(&call_id).await;
                });
            }
            Ok(Json(view))
        }
        _ => Err((
            StatusCode::CONFLICT,
            Json(ErrorBody::new("call is not active")),
        )),
    }
}

async fn call_view(
    UserSession(user_id): UserSession,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CallView>, StatusCode> {
    let calls = state.calls.read().await;
    let session = calls.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    if session.user_id != user_id {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(Json(CallView::of(session)))
}

/// Events pushed by the voice collaborator, keyed by its call id.
async fn voice_webhook(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(hook): Json<VoiceWebhook>,
) -> StatusCode {
    if let Some(secret) = &state.webhook_secret {
        let presented = headers
            .get("x-vapi-secret")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != secret {
            tracing::warn!("Voice webhook rejected: bad secret");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let (session_id, transition) = {
        let mut calls = state.calls.write().await;
        let Some(session_id) = calls.resolve_provider(&hook.call_id) else {
            tracing::warn!("Voice event for unknown call {}", hook.call_id);
            return StatusCode::NOT_FOUND;
        };
        let Some(session) = calls.get_mut(&session_id) else {
            return StatusCode::NOT_FOUND;
        };
        (session_id, session.apply(&hook.event))
    };

    match transition {
        Transition::Finished => {
            tokio::spawn(finalize_session(state.clone(), session_id));
        }
        Transition::Aborted => {
            if let VoiceEvent::Error { message } = &hook.event {
                tracing::warn!("Call session {} aborted: {}", session_id, message);
            } else {
                tracing::info!("Call session {} ended before it became active", session_id);
            }
        }
        Transition::Activated => {
            tracing::info!("Call session {} is live", session_id);
        }
        Transition::None => {}
    }

    StatusCode::NO_CONTENT
}

/// Exit flow for a finished session. Runs once per session (the Finished
/// transition fires on one edge only): generate-mode sessions go straight
/// home, interview sessions get exactly one feedback run over the full
/// transcript.
pub(crate) async fn finalize_session(state: SharedState, session_id: Uuid) {
    let snapshot = {
        let calls = state.calls.read().await;
        let Some(session) = calls.get(&session_id) else {
            return;
        };
        (session.mode, session.interview_id, session.user_id, session.transcript.clone())
    };
    let (mode, interview_id, user_id, transcript) = snapshot;

    let route = match plan_exit(mode, interview_id) {
        ExitPlan::Route(route) => route,
        ExitPlan::GenerateFeedback { interview_id } => {
            let result = create_feedback(&state, interview_id, user_id, &transcript).await;
            if result.success {
                ExitRoute::Feedback { interview_id }
            } else {
                // Logged by the feedback service; the user just goes home.
                ExitRoute::Home
            }
        }
    };

    let mut calls = state.calls.write().await;
    if let Some(session) = calls.get_mut(&session_id) {
        session.resolve_exit(route);
    }
}
