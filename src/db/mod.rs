use crate::domain::models::CategoryScore;
use crate::services::ai::FeedbackDraft;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Interview {
    pub id: Uuid,
    pub role: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub techstack: Vec<String>,
    pub questions: Vec<String>,
    pub user_id: Uuid,
    pub finalized: bool,
    pub cover_image: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub user_id: Uuid,
    pub total_score: i32,
    pub category_scores: Json<Vec<CategoryScore>>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
    pub created_at: DateTime<Utc>,
}

/// Interview fields assembled by the generation endpoint before insert.
#[derive(Debug, Clone)]
pub struct NewInterview {
    pub role: String,
    pub kind: String,
    pub level: String,
    pub techstack: Vec<String>,
    pub questions: Vec<String>,
    pub user_id: Uuid,
    pub finalized: bool,
    pub cover_image: String,
}

const INTERVIEW_COLUMNS: &str =
    r#"id, role, "type", level, techstack, questions, user_id, finalized, cover_image, created_at"#;

const FEEDBACK_COLUMNS: &str = "id, interview_id, user_id, total_score, category_scores, \
     strengths, areas_for_improvement, final_assessment, created_at";

// ---- users ----------------------------------------------------------------

pub async fn create_user(pool: &PgPool, name: &str, email: &str, hash: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, name, email, hash) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(hash)
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, hash, created_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DbUser>> {
    let user = sqlx::query_as::<_, DbUser>(
        "SELECT id, name, email, hash, created_at FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

// ---- interview / feedback query layer -------------------------------------
//
// The four read paths never raise: a store failure degrades to an empty
// result so callers can render an empty state instead of an error page.

pub async fn interviews_by_user(pool: &PgPool, user_id: Uuid) -> Vec<Interview> {
    let query = format!(
        "SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE user_id = $1 ORDER BY created_at DESC"
    );
    match sqlx::query_as::<_, Interview>(&query)
        .bind(user_id)
        .fetch_all(pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Failed to fetch interviews for user {}: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Finalized interviews owned by anyone but `exclude_user_id`. The owner id
/// leads the ordering because the store pairs the inequality filter with it;
/// recency ordering applies within each owner.
pub async fn latest_interviews(pool: &PgPool, exclude_user_id: Uuid, limit: i64) -> Vec<Interview> {
    let query = format!(
        "SELECT {INTERVIEW_COLUMNS} FROM interviews \
         WHERE finalized = TRUE AND user_id <> $1 \
         ORDER BY user_id, created_at DESC \
         LIMIT $2"
    );
    match sqlx::query_as::<_, Interview>(&query)
        .bind(exclude_user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Failed to fetch latest interviews: {}", e);
            Vec::new()
        }
    }
}

pub async fn interview_by_id(pool: &PgPool, id: Uuid) -> Option<Interview> {
    let query = format!("SELECT {INTERVIEW_COLUMNS} FROM interviews WHERE id = $1");
    match sqlx::query_as::<_, Interview>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!("Failed to fetch interview {}: {}", id, e);
            None
        }
    }
}

/// The single feedback record for an (interview, user) pair, if one exists.
pub async fn feedback_for_interview(
    pool: &PgPool,
    interview_id: Uuid,
    user_id: Uuid,
) -> Option<Feedback> {
    let query = format!(
        "SELECT {FEEDBACK_COLUMNS} FROM feedback \
         WHERE interview_id = $1 AND user_id = $2 \
         ORDER BY created_at DESC \
         LIMIT 1"
    );
    match sqlx::query_as::<_, Feedback>(&query)
        .bind(interview_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(
                "Failed to fetch feedback for interview {}: {}",
                interview_id,
                e
            );
            None
        }
    }
}

// ---- writes ---------------------------------------------------------------

pub async fn insert_interview(pool: &PgPool, interview: &NewInterview) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"INSERT INTO interviews
           (id, role, "type", level, techstack, questions, user_id, finalized, cover_image)
           VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
    )
    .bind(id)
    .bind(&interview.role)
    .bind(&interview.kind)
    .bind(&interview.level)
    .bind(&interview.techstack)
    .bind(&interview.questions)
    .bind(interview.user_id)
    .bind(interview.finalized)
    .bind(&interview.cover_image)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn insert_feedback(
    pool: &PgPool,
    interview_id: Uuid,
    user_id: Uuid,
    draft: &FeedbackDraft,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO feedback
         (id, interview_id, user_id, total_score, category_scores,
          strengths, areas_for_improvement, final_assessment)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(id)
    .bind(interview_id)
    .bind(user_id)
    .bind(draft.total_score)
    .bind(Json(&draft.category_scores))
    .bind(&draft.strengths)
    .bind(&draft.areas_for_improvement)
    .bind(&draft.final_assessment)
    .execute(pool)
    .await?;
    Ok(id)
}
