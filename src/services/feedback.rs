//! Feedback creation: transcript in, one persisted feedback record out.
//! Every failure mode collapses into a typed `success: false` result; callers
//! branch, they never catch.

use crate::db;
use crate::domain::models::{format_transcript, TranscriptEntry};
use crate::state::SharedState;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeedbackResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<Uuid>,
}

impl CreateFeedbackResult {
    fn failure() -> Self {
        Self {
            success: false,
            feedback_id: None,
        }
    }
}

/// Evaluate a transcript and persist the resulting feedback record. Duplicate
/// submissions create duplicate records; there is no dedup here.
pub async fn create_feedback(
    state: &SharedState,
    interview_id: Uuid,
    user_id: Uuid,
    transcript: &[TranscriptEntry],
) -> CreateFeedbackResult {
    let formatted = format_transcript(transcript);

    let draft = match state.ai.generate_feedback(&formatted).await {
        Ok(draft) => draft,
        Err(e) => {
            tracing::error!(
                "Feedback generation failed for interview {}: {:#}",
                interview_id,
                e
            );
            return CreateFeedbackResult::failure();
        }
    };

    match db::insert_feedback(&state.pool, interview_id, user_id, &draft).await {
        Ok(id) => {
            tracing::info!(
                "Feedback {} created for interview {} (total score {})",
                id,
                interview_id,
                draft.total_score
            );
            CreateFeedbackResult {
                success: true,
                feedback_id: Some(id),
            }
        }
        Err(e) => {
            tracing::error!(
                "Failed to persist feedback for interview {}: {:#}",
                interview_id,
                e
            );
            CreateFeedbackResult::failure()
        }
    }
}
