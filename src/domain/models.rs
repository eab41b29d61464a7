use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// The five scoring categories every feedback record carries, in report order.
pub const FEEDBACK_CATEGORIES: [&str; 5] = [
    "Communication Skills",
    "Technical Knowledge",
    "Problem Solving",
    "Cultural & Role Fit",
    "Confidence & Clarity",
];

/// Cover images assigned to generated interviews. Served from the static bundle.
pub const INTERVIEW_COVERS: [&str; 11] = [
    "/covers/adobe.png",
    "/covers/amazon.png",
    "/covers/facebook.png",
    "/covers/hostinger.png",
    "/covers/pinterest.png",
    "/covers/quora.png",
    "/covers/reddit.png",
    "/covers/skype.png",
    "/covers/spotify.png",
    "/covers/telegram.png",
    "/covers/tiktok.png",
];

pub fn random_cover() -> &'static str {
    INTERVIEW_COVERS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(INTERVIEW_COVERS[0])
}

/// Split a comma-separated tech stack into its entries, trimming each one.
/// Order is preserved; empty entries are kept as given.
pub fn split_techstack(raw: &str) -> Vec<String> {
    raw.split(',').map(|t| t.trim().to_string()).collect()
}

/// Display label for an interview type. Anything containing "mix" renders as
/// "Mixed"; the stored value is untouched.
pub fn display_interview_type(kind: &str) -> String {
    if kind.to_lowercase().contains("mix") {
        "Mixed".to_string()
    } else {
        kind.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    System,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::System => "system",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One finalized utterance in a call transcript. Entries are append-only and
/// never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: MessageRole,
    pub content: String,
}

/// Render a transcript the way the evaluation prompt expects it, one
/// `- role: content` line per utterance.
pub fn format_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("- {}: {}\n", e.role.as_str(), e.content))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    pub score: i32,
    pub comment: String,
}
