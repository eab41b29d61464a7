//! Interface to the external voice collaborator. The transport itself is
//! opaque: this module only knows how to ask for a call to start or stop and
//! how to decode the lifecycle events the collaborator delivers back on the
//! events webhook.

use crate::domain::models::{MessageRole, TranscriptEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("voice collaborator is not configured: {0}")]
    Config(&'static str),
    #[error("voice call request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("voice collaborator rejected the call: {0}")]
    Rejected(String),
}

/// What the collaborator should run for a call: a scripted workflow (question
/// generation) or a conversational assistant (the interviewer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallTarget {
    Workflow(String),
    Assistant(String),
}

#[async_trait]
pub trait VoiceClient: Send + Sync {
    /// Ask the collaborator to start a call. Returns the provider's call id,
    /// which later webhook events are keyed by.
    async fn start(
        &self,
        target: &CallTarget,
        variables: serde_json::Value,
    ) -> Result<String, VoiceError>;

    /// End a running call. The local session has already moved on by the time
    /// this is issued; failures are logged, not surfaced.
    async fn stop(&self, provider_call_id: &str) -> Result<(), VoiceError>;

    fn workflow_target(&self) -> CallTarget;

    fn interviewer_target(&self) -> CallTarget;
}

/// Lifecycle and transcript events delivered by the collaborator. The webhook
/// body is `{"call_id": ..., "event": ...}` with the event fields alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum VoiceEvent {
    CallStart,
    CallEnd,
    Message { message: VoiceMessage },
    SpeechStart,
    SpeechEnd,
    VolumeLevel { level: f32 },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub transcript_type: Option<TranscriptType>,
    #[serde(default)]
    pub role: Option<MessageRole>,
    #[serde(default)]
    pub transcript: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptType {
    Partial,
    Final,
}

impl VoiceMessage {
    /// The transcript entry this message contributes, if any. Only finalized
    /// transcript fragments count; interim ones are discarded outright.
    pub fn final_transcript(&self) -> Option<TranscriptEntry> {
        if self.kind != "transcript" || self.transcript_type != Some(TranscriptType::Final) {
            return None;
        }
        let role = self.role?;
        let content = self.transcript.clone()?;
        Some(TranscriptEntry { role, content })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceWebhook {
    pub call_id: String,
    #[serde(flatten)]
    pub event: VoiceEvent,
}

/// Vapi-style REST client. Constructed explicitly from configuration; if the
/// credential or workflow id is missing the constructor fails and the service
/// runs with voice sessions disabled.
pub struct VapiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    workflow_id: String,
    assistant_id: Option<String>,
}

impl VapiClient {
    pub fn from_env() -> Result<Self, VoiceError> {
        let token = std::env::var("VAPI_API_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(VoiceError::Config("VAPI_API_KEY is not set"))?;
        let workflow_id = std::env::var("VAPI_WORKFLOW_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(VoiceError::Config("VAPI_WORKFLOW_ID is not set"))?;
        let assistant_id = std::env::var("VAPI_ASSISTANT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let base_url =
            std::env::var("VAPI_BASE_URL").unwrap_or_else(|_| "https://api.vapi.ai".to_string());
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            token,
            workflow_id,
            assistant_id,
        })
    }
}

#[async_trait]
impl VoiceClient for VapiClient {
    async fn start(
        &self,
        target: &CallTarget,
        variables: serde_json::Value,
    ) -> Result<String, VoiceError> {
        let mut body = serde_json::json!({
            "assistantOverrides": { "variableValues": variables },
        });
        match target {
            CallTarget::Workflow(id) => body["workflowId"] = serde_json::json!(id),
            CallTarget::Assistant(id) => body["assistantId"] = serde_json::json!(id),
        }

        let resp = self
            .http
            .post(format!("{}/call", self.base_url))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Rejected(format!("{status}: {detail}")));
        }

        let payload: serde_json::Value = resp.json().await?;
        payload
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| VoiceError::Rejected("response carried no call id".to_string()))
    }

    async fn stop(&self, provider_call_id: &str) -> Result<(), VoiceError> {
        let resp = self
            .http
            .post(format!("{}/call/{}/stop", self.base_url, provider_call_id))
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(VoiceError::Rejected(format!("{status}: {detail}")));
        }
        Ok(())
    }

    fn workflow_target(&self) -> CallTarget {
        CallTarget::Workflow(self.workflow_id.clone())
    }

    fn interviewer_target(&self) -> CallTarget {
        match &self.assistant_id {
            Some(id) => CallTarget::Assistant(id.clone()),
            None => CallTarget::Workflow(self.workflow_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_lifecycle_events() {
        let hook: VoiceWebhook =
            serde_json::from_str(r#"{"call_id":"c1","event":"call-start"}"#).unwrap();
        assert_eq!(hook.call_id, "c1");
        assert_eq!(hook.event, VoiceEvent::CallStart);

        let hook: VoiceWebhook =
            serde_json::from_str(r#"{"call_id":"c1","event":"call-end"}"#).unwrap();
        assert_eq!(hook.event, VoiceEvent::CallEnd);
    }

    #[test]
    fn decodes_final_transcript_message() {
        let raw = r#"{
            "call_id": "c1",
            "event": "message",
            "message": {
                "type": "transcript",
                "transcriptType": "final",
                "role": "user",
                "transcript": "I enjoy systems work."
            }
        }"#;
        let hook: VoiceWebhook = serde_json::from_str(raw).unwrap();
        let VoiceEvent::Message { message } = hook.event else {
            panic!("expected a message event");
        };
        let entry = message.final_transcript().expect("final transcript");
        assert_eq!(entry.role, MessageRole::User);
        assert_eq!(entry.content, "I enjoy systems work.");
    }

    #[test]
    fn interim_transcripts_are_discarded() {
        let message = VoiceMessage {
            kind: "transcript".to_string(),
            transcript_type: Some(TranscriptType::Partial),
            role: Some(MessageRole::User),
            transcript: Some("I enj".to_string()),
        };
        assert!(message.final_transcript().is_none());
    }

    #[test]
    fn non_transcript_messages_contribute_nothing() {
        let message = VoiceMessage {
            kind: "conversation-update".to_string(),
            transcript_type: None,
            role: None,
            transcript: None,
        };
        assert!(message.final_transcript().is_none());
    }

    #[test]
    fn decodes_error_and_telemetry_events() {
        let hook: VoiceWebhook = serde_json::from_str(
            r#"{"call_id":"c1","event":"error","message":"room closed"}"#,
        )
        .unwrap();
        assert_eq!(
            hook.event,
            VoiceEvent::Error {
                message: "room closed".to_string()
            }
        );

        let hook: VoiceWebhook =
            serde_json::from_str(r#"{"call_id":"c1","event":"volume-level","level":0.4}"#).unwrap();
        assert!(matches!(hook.event, VoiceEvent::VolumeLevel { .. }));
    }
}
