use crate::domain::models::{CategoryScore, FEEDBACK_CATEGORIES};
use anyhow::{anyhow, bail, Context, Result};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use serde::{Deserialize, Serialize};

const QUESTION_SYSTEM_PROMPT: &str =
    "You are a professional hiring manager. Generate clear, concise interview questions.";

const FEEDBACK_SYSTEM_PROMPT: &str = "You are a professional interviewer analyzing a mock \
     interview. Your task is to evaluate the candidate based on structured categories.";

#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub role: String,
    pub kind: String,
    pub level: String,
    pub techstack: String,
    pub amount: u32,
}

/// Feedback as produced by the model, before it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDraft {
    pub total_score: i32,
    pub category_scores: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub final_assessment: String,
}

impl FeedbackDraft {
    fn clamp_scores(&mut self) {
        self.total_score = self.total_score.clamp(0, 100);
        for category in &mut self.category_scores {
            category.score = category.score.clamp(0, 100);
        }
    }

    fn ensure_categories(&self) -> Result<()> {
        for name in FEEDBACK_CATEGORIES {
            if !self.category_scores.iter().any(|c| c.name == name) {
                bail!("model output is missing the \"{name}\" category");
            }
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct AiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl AiService {
    pub fn new(api_key: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        // Provider choice is configuration, not logic.
        let model = std::env::var("PREPWISE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        Self { client, model }
    }

    pub async fn generate_questions(&self, request: &QuestionRequest) -> Result<Vec<String>> {
        let raw = self
            .complete(QUESTION_SYSTEM_PROMPT, question_prompt(request))
            .await?;
        parse_questions(&raw)
    }

    pub async fn generate_feedback(&self, transcript: &str) -> Result<FeedbackDraft> {
        let raw = self
            .complete(FEEDBACK_SYSTEM_PROMPT, feedback_prompt(transcript))
            .await?;
        parse_feedback(&raw)
    }

    // One completion per request, no retries: a bad generation is a terminal
    // failure for that attempt.
    async fn complete(&self, system: &str, user: String) -> Result<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system.to_string(),
                role: Role::System,
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user),
                role: Role::User,
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .temperature(0.4)
            .build()?;

        let resp = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| anyhow!("completion request failed: {e}"))?;

        let content = resp
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        if content.trim().is_empty() {
            bail!("model returned an empty completion");
        }
        Ok(content)
    }
}

fn question_prompt(request: &QuestionRequest) -> String {
    format!(
        "Generate exactly {amount} questions for a {level} {role} interview.\n\
         Focus: {kind}.\n\
         Tech stack: {techstack}.\n\
         Respond with a JSON object of the form {{\"questions\": [\"...\"]}} and nothing else.",
        amount = request.amount,
        level = request.level,
        role = request.role,
        kind = request.kind,
        techstack = request.techstack,
    )
}

fn feedback_prompt(transcript: &str) -> String {
    format!(
        "Analyze this mock interview. Be thorough and detailed; do not be lenient with the \
         candidate. If there are mistakes or areas for improvement, point them out.\n\n\
         Transcript:\n{transcript}\n\
         Score the candidate from 0 to 100 in each of these categories:\n\
         - Communication Skills: clarity, articulation, structured responses.\n\
         - Technical Knowledge: understanding of key concepts for the role.\n\
         - Problem Solving: ability to analyze problems and propose solutions.\n\
         - Cultural & Role Fit: alignment with company values and the job role.\n\
         - Confidence & Clarity: confidence in responses, engagement, and clarity.\n\
         Respond with a JSON object of the form {{\"totalScore\": 0-100, \"categoryScores\": \
         [{{\"name\": \"...\", \"score\": 0-100, \"comment\": \"...\"}}], \"strengths\": \
         [\"...\"], \"areasForImprovement\": [\"...\"], \"finalAssessment\": \"...\"}} and \
         nothing else. Use the category names exactly as written above."
    )
}

/// Models wrap JSON in prose or code fences often enough that we cut the
/// outermost object out before parsing.
fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn parse_questions(raw: &str) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct QuestionList {
        questions: Vec<String>,
    }

    let parsed: QuestionList = serde_json::from_str(extract_json(raw))
        .context("model output was not a question list")?;
    let questions: Vec<String> = parsed
        .questions
        .into_iter()
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect();
    if questions.is_empty() {
        bail!("model returned no questions");
    }
    Ok(questions)
}

fn parse_feedback(raw: &str) -> Result<FeedbackDraft> {
    let mut draft: FeedbackDraft = serde_json::from_str(extract_json(raw))
        .context("model output did not match the feedback shape")?;
    draft.clamp_scores();
    draft.ensure_categories()?;
    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_plain_question_list() {
        let raw = r#"{"questions": ["What is ownership?", " Explain lifetimes. "]}"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions, vec!["What is ownership?", "Explain lifetimes."]);
    }

    #[test]
    fn parses_a_fenced_question_list() {
        let raw = "Here you go:\n```json\n{\"questions\": [\"Q1\", \"Q2\"]}\n```";
        assert_eq!(parse_questions(raw).unwrap(), vec!["Q1", "Q2"]);
    }

    #[test]
    fn empty_question_list_is_an_error() {
        assert!(parse_questions(r#"{"questions": []}"#).is_err());
        assert!(parse_questions(r#"{"questions": ["", "  "]}"#).is_err());
        assert!(parse_questions("no json here").is_err());
    }

    fn feedback_json(score: i32) -> String {
        let categories: Vec<String> = FEEDBACK_CATEGORIES
            .iter()
            .map(|name| format!(r#"{{"name": "{name}", "score": {score}, "comment": "ok"}}"#))
            .collect();
        format!(
            r#"{{"totalScore": {score}, "categoryScores": [{}],
                "strengths": ["clear answers"], "areasForImprovement": ["more depth"],
                "finalAssessment": "Solid overall."}}"#,
            categories.join(",")
        )
    }

    #[test]
    fn parses_a_complete_feedback_draft() {
        let draft = parse_feedback(&feedback_json(72)).unwrap();
        assert_eq!(draft.total_score, 72);
        assert_eq!(draft.category_scores.len(), 5);
        assert_eq!(draft.final_assessment, "Solid overall.");
    }

    #[test]
    fn scores_are_clamped_to_the_valid_range() {
        let draft = parse_feedback(&feedback_json(140)).unwrap();
        assert_eq!(draft.total_score, 100);
        assert!(draft.category_scores.iter().all(|c| c.score == 100));

        let draft = parse_feedback(&feedback_json(-3)).unwrap();
        assert_eq!(draft.total_score, 0);
    }

    #[test]
    fn missing_category_is_an_error() {
        let raw = r#"{"totalScore": 50,
            "categoryScores": [{"name": "Communication Skills", "score": 50, "comment": "ok"}],
            "strengths": [], "areasForImprovement": [], "finalAssessment": "x"}"#;
        assert!(parse_feedback(raw).is_err());
    }

    #[test]
    fn question_prompt_carries_every_field() {
        let request = QuestionRequest {
            role: "backend".to_string(),
            kind: "technical".to_string(),
            level: "junior".to_string(),
            techstack: "node,postgres".to_string(),
            amount: 5,
        };
        let prompt = question_prompt(&request);
        assert!(prompt.contains("exactly 5 questions"));
        assert!(prompt.contains("junior backend interview"));
        assert!(prompt.contains("Focus: technical."));
        assert!(prompt.contains("node,postgres"));
    }
}
