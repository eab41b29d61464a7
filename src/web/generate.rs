//! The question-generation endpoint. It is called cross-origin by the voice
//! workflow, so it answers preflight requests and carries its own rate limit.

use crate::db::{self, NewInterview};
use crate::domain::models::{random_cover, split_techstack};
use crate::middleware::{client_ip, RateLimiter};
use crate::services::ai::QuestionRequest;
use crate::state::SharedState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

static GENERATE_LIMITER: Lazy<RateLimiter> = Lazy::new(|| RateLimiter::new(20, 60));

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub techstack: Option<String>,
    #[serde(default)]
    pub amount: Option<AmountField>,
    #[serde(default)]
    pub userid: Option<String>,
}

/// The workflow sends `amount` as either a number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(i64),
    Text(String),
}

impl AmountField {
    fn as_count(&self) -> Option<u32> {
        let n = match self {
            AmountField::Number(n) => *n,
            AmountField::Text(s) => s.trim().parse::<i64>().ok()?,
        };
        if n > 0 {
            u32::try_from(n).ok()
        } else {
            None
        }
    }
}

#[derive(Serialize)]
struct GenerateResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl GenerateResponse {
    fn ok(questions: Vec<String>) -> Self {
        Self {
            success: true,
            questions: Some(questions),
            error: None,
        }
    }

    fn failure(error: &str) -> Self {
        Self {
            success: false,
            questions: None,
            error: Some(error.to_string()),
        }
    }
}

/// A validated generation job: every field present, amount positive, owner id
/// well-formed.
#[derive(Debug, PartialEq)]
struct GenerateJob {
    kind: String,
    role: String,
    level: String,
    techstack: String,
    amount: u32,
    user_id: Uuid,
}

fn validate(payload: GenerateRequest) -> Result<GenerateJob, &'static str> {
    fn required(field: Option<String>) -> Result<String, &'static str> {
        field
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or("Missing required fields")
    }

    let kind = required(payload.kind)?;
    let role = required(payload.role)?;
    let level = required(payload.level)?;
    let techstack = required(payload.techstack)?;
    let userid = required(payload.userid)?;

    let amount = payload
        .amount
        .ok_or("Missing required fields")?
        .as_count()
        .ok_or("amount must be a positive number")?;
    let user_id = Uuid::parse_str(&userid).map_err(|_| "userid must be a valid user id")?;

    Ok(GenerateJob {
        kind,
        role,
        level,
        techstack,
        amount,
        user_id,
    })
}

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(generate).get(usage))
        .layer(cors)
        .with_state(state)
}

async fn generate(
    headers: HeaderMap,
    State(state): State<SharedState>,
    Json(payload): Json<GenerateRequest>,
) -> (StatusCode, Json<GenerateResponse>) {
    let ip = client_ip(&headers);
    if !GENERATE_LIMITER.allow(&ip).await {
        tracing::warn!("Generation rate limit exceeded for IP: {}", ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(GenerateResponse::failure("too many requests")),
        );
    }

    // Validation happens before any external call.
    let job = match validate(payload) {
        Ok(job) => job,
        Err(msg) => return (StatusCode::BAD_REQUEST, Json(GenerateResponse::failure(msg))),
    };

    let request = QuestionRequest {
        role: job.role.clone(),
        kind: job.kind.clone(),
        level: job.level.clone(),
        techstack: job.techstack.clone(),
        amount: job.amount,
    };
    let questions = match state.ai.generate_questions(&request).await {
        Ok(questions) => questions,
        Err(e) => {
            tracing::error!("Question generation failed: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerateResponse::failure("question generation failed")),
            );
        }
    };

    let interview = NewInterview {
        role: job.role,
        kind: job.kind,
        level: job.level,
        techstack: split_techstack(&job.techstack),
        questions: questions.clone(),
        user_id: job.user_id,
        finalized: true,
        cover_image: random_cover().to_string(),
    };

    match db::insert_interview(&state.pool, &interview).await {
        Ok(id) => {
            tracing::info!(
                "Interview {} created for user {} ({} questions)",
                id,
                interview.user_id,
                questions.len()
            );
            (StatusCode::OK, Json(GenerateResponse::ok(questions)))
        }
        Err(e) => {
            tracing::error!("Failed to save generated interview: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(GenerateResponse::failure("failed to save the interview")),
            )
        }
    }
}

async fn usage() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "message": "Interview generation API",
        "usage": "POST with type, role, level, techstack, amount, and userid",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_request() -> GenerateRequest {
        GenerateRequest {
            kind: Some("technical".to_string()),
            role: Some("backend".to_string()),
            level: Some("junior".to_string()),
            techstack: Some("node,postgres".to_string()),
            amount: Some(AmountField::Number(5)),
            userid: Some(Uuid::new_v4().to_string()),
        }
    }

    #[test]
    fn accepts_a_complete_request() {
        let job = validate(full_request()).unwrap();
        assert_eq!(job.amount, 5);
        assert_eq!(job.techstack, "node,postgres");
    }

    #[test]
    fn rejects_missing_or_blank_fields() {
        let mut payload = full_request();
        payload.role = None;
        assert_eq!(validate(payload), Err("Missing required fields"));

        let mut payload = full_request();
        payload.level = Some("   ".to_string());
        assert_eq!(validate(payload), Err("Missing required fields"));

        let mut payload = full_request();
        payload.amount = None;
        assert_eq!(validate(payload), Err("Missing required fields"));
    }

    #[test]
    fn amount_accepts_numeric_strings() {
        let mut payload = full_request();
        payload.amount = Some(AmountField::Text(" 7 ".to_string()));
        assert_eq!(validate(payload).unwrap().amount, 7);
    }

    #[test]
    fn rejects_non_positive_or_garbage_amounts() {
        for amount in [
            AmountField::Number(0),
            AmountField::Number(-2),
            AmountField::Text("five".to_string()),
            AmountField::Text("".to_string()),
        ] {
            let mut payload = full_request();
            payload.amount = Some(amount);
            assert_eq!(validate(payload), Err("amount must be a positive number"));
        }
    }

    #[test]
    fn rejects_a_malformed_userid() {
        let mut payload = full_request();
        payload.userid = Some("not-a-uuid".to_string());
        assert_eq!(validate(payload), Err("userid must be a valid user id"));
    }

    #[test]
    fn amount_field_decodes_from_json_number_and_string() {
        let n: AmountField = serde_json::from_value(serde_json::json!(5)).unwrap();
        assert_eq!(n.as_count(), Some(5));
        let s: AmountField = serde_json::from_value(serde_json::json!("12")).unwrap();
        assert_eq!(s.as_count(), Some(12));
    }
}
