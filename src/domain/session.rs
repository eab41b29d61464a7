//! The per-call interview session: a small state machine driven by events
//! from the voice collaborator, plus the registry that holds live sessions.

use crate::domain::models::TranscriptEntry;
use crate::voice::VoiceEvent;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Inactive,
    Connecting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Generate,
    Interview,
}

/// Where the client is sent once a session is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "to", rename_all = "kebab-case")]
pub enum ExitRoute {
    Home,
    #[serde(rename_all = "camelCase")]
    Feedback { interview_id: Uuid },
}

/// What a state change means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing the caller needs to act on.
    None,
    /// The call went live.
    Activated,
    /// The session reached its terminal state; run the exit flow exactly once.
    Finished,
    /// The session was aborted; no feedback is attempted.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct InterviewSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub interview_id: Option<Uuid>,
    pub mode: SessionMode,
    pub status: CallStatus,
    pub transcript: Vec<TranscriptEntry>,
    pub provider_call_id: Option<String>,
    pub speaking: bool,
    pub exit: Option<ExitRoute>,
    pub started_at: DateTime<Utc>,
}

impl InterviewSession {
    pub fn new(user_id: Uuid, mode: SessionMode, interview_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            interview_id,
            mode,
            status: CallStatus::Inactive,
            transcript: Vec::new(),
            provider_call_id: None,
            speaking: false,
            exit: None,
            started_at: Utc::now(),
        }
    }

    /// Move into `Connecting` once the collaborator has accepted the call.
    /// Only valid from `Inactive`.
    pub fn begin(&mut self, provider_call_id: String) -> bool {
        if self.status != CallStatus::Inactive {
            return false;
        }
        self.provider_call_id = Some(provider_call_id);
        self.status = CallStatus::Connecting;
        true
    }

    /// Apply one collaborator event. Transcript accumulation happens here as
    /// well: finalized fragments are appended in arrival order, everything
    /// else is dropped.
    pub fn apply(&mut self, event: &VoiceEvent) -> Transition {
        match event {
            VoiceEvent::CallStart => {
                if self.status == CallStatus::Connecting {
                    self.status = CallStatus::Active;
                    Transition::Activated
                } else {
                    Transition::None
                }
            }
            VoiceEvent::CallEnd => self.end_call(),
            VoiceEvent::Message { message } => {
                if let Some(entry) = message.final_transcript() {
                    self.transcript.push(entry);
                }
                Transition::None
            }
            VoiceEvent::SpeechStart => {
                self.speaking = true;
                Transition::None
            }
            VoiceEvent::SpeechEnd => {
                self.speaking = false;
                Transition::None
            }
            VoiceEvent::VolumeLevel { .. } => Transition::None,
            VoiceEvent::Error { .. } => {
                if self.status == CallStatus::Finished {
                    return Transition::None;
                }
                self.status = CallStatus::Inactive;
                self.speaking = false;
                Transition::Aborted
            }
        }
    }

    /// Explicit stop from the client. The session is marked `Finished`
    /// immediately, before the collaborator confirms the call is gone.
    pub fn stop(&mut self) -> Transition {
        self.end_call()
    }

    fn end_call(&mut self) -> Transition {
        match self.status {
            CallStatus::Active => {
                self.status = CallStatus::Finished;
                self.speaking = false;
                Transition::Finished
            }
            // A call that ends before it ever started is an abort, not a
            // completed session.
            CallStatus::Connecting => {
                self.status = CallStatus::Inactive;
                Transition::Aborted
            }
            _ => Transition::None,
        }
    }

    /// Record the exit decision. First writer wins; the route never changes
    /// once set.
    pub fn resolve_exit(&mut self, route: ExitRoute) {
        if self.status == CallStatus::Finished && self.exit.is_none() {
            self.exit = Some(route);
        }
    }

    pub fn last_message(&self) -> Option<&TranscriptEntry> {
        self.transcript.last()
    }
}

/// What the exit flow has to do for a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitPlan {
    Route(ExitRoute),
    GenerateFeedback { interview_id: Uuid },
}

/// Decide the exit flow for a finished session. Generate-mode sessions never
/// produce feedback; interview sessions do, keyed by their interview.
pub fn plan_exit(mode: SessionMode, interview_id: Option<Uuid>) -> ExitPlan {
    match (mode, interview_id) {
        (SessionMode::Generate, _) => ExitPlan::Route(ExitRoute::Home),
        (SessionMode::Interview, Some(interview_id)) => ExitPlan::GenerateFeedback { interview_id },
        (SessionMode::Interview, None) => ExitPlan::Route(ExitRoute::Home),
    }
}

/// Live sessions, keyed by session id with a secondary index by the
/// collaborator's call id (webhook events only know the latter).
#[derive(Default)]
pub struct CallRegistry {
    sessions: HashMap<Uuid, InterviewSession>,
    by_provider: HashMap<String, Uuid>,
}

impl CallRegistry {
    pub fn insert(&mut self, session: InterviewSession) {
        if let Some(provider) = &session.provider_call_id {
            self.by_provider.insert(provider.clone(), session.id);
        }
        self.sessions.insert(session.id, session);
    }

    pub fn get(&self, id: &Uuid) -> Option<&InterviewSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut InterviewSession> {
        self.sessions.get_mut(id)
    }

    pub fn resolve_provider(&self, provider_call_id: &str) -> Option<Uuid> {
        self.by_provider.get(provider_call_id).copied()
    }

    /// Drop terminal sessions older than `max_age`. Run from the scheduler.
    pub fn prune_terminal(&mut self, max_age: Duration) -> usize {
        let now = Utc::now();
        let stale: Vec<Uuid> = self
            .sessions
            .values()
            .filter(|s| {
                matches!(s.status, CallStatus::Finished | CallStatus::Inactive)
                    && now - s.started_at > max_age
            })
            .map(|s| s.id)
            .collect();
        for id in &stale {
            if let Some(session) = self.sessions.remove(id) {
                if let Some(provider) = session.provider_call_id {
                    self.by_provider.remove(&provider);
                }
            }
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MessageRole;
    use crate::voice::{TranscriptType, VoiceMessage};

    fn session(mode: SessionMode) -> InterviewSession {
        InterviewSession::new(Uuid::new_v4(), mode, Some(Uuid::new_v4()))
    }

    fn transcript_event(kind: &str, transcript_type: Option<TranscriptType>, text: &str) -> VoiceEvent {
        VoiceEvent::Message {
            message: VoiceMessage {
                kind: kind.to_string(),
                transcript_type,
                role: Some(MessageRole::User),
                transcript: Some(text.to_string()),
            },
        }
    }

    #[test]
    fn connecting_is_only_reachable_from_inactive() {
        let mut s = session(SessionMode::Interview);
        assert!(s.begin("call-1".to_string()));
        assert_eq!(s.status, CallStatus::Connecting);
        assert!(!s.begin("call-2".to_string()));
        assert_eq!(s.provider_call_id.as_deref(), Some("call-1"));
    }

    #[test]
    fn active_is_only_reachable_from_connecting() {
        let mut s = session(SessionMode::Interview);
        assert_eq!(s.apply(&VoiceEvent::CallStart), Transition::None);
        assert_eq!(s.status, CallStatus::Inactive);

        s.begin("call-1".to_string());
        assert_eq!(s.apply(&VoiceEvent::CallStart), Transition::Activated);
        assert_eq!(s.status, CallStatus::Active);
    }

    #[test]
    fn call_end_finishes_an_active_session() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        assert_eq!(s.apply(&VoiceEvent::CallEnd), Transition::Finished);
        assert_eq!(s.status, CallStatus::Finished);
        // Second end event is a no-op: the exit flow must only run once.
        assert_eq!(s.apply(&VoiceEvent::CallEnd), Transition::None);
    }

    #[test]
    fn stop_is_optimistic() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        assert_eq!(s.stop(), Transition::Finished);
        assert_eq!(s.status, CallStatus::Finished);
    }

    #[test]
    fn error_forces_inactive_and_aborts() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        let err = VoiceEvent::Error {
            message: "mic denied".to_string(),
        };
        assert_eq!(s.apply(&err), Transition::Aborted);
        assert_eq!(s.status, CallStatus::Inactive);

        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        assert_eq!(s.apply(&err), Transition::Aborted);
        assert_eq!(s.status, CallStatus::Inactive);
    }

    #[test]
    fn no_transition_out_of_finished() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        s.apply(&VoiceEvent::CallEnd);

        let err = VoiceEvent::Error {
            message: "late error".to_string(),
        };
        assert_eq!(s.apply(&err), Transition::None);
        assert_eq!(s.apply(&VoiceEvent::CallStart), Transition::None);
        assert_eq!(s.status, CallStatus::Finished);
    }

    #[test]
    fn call_end_while_connecting_aborts() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        assert_eq!(s.apply(&VoiceEvent::CallEnd), Transition::Aborted);
        assert_eq!(s.status, CallStatus::Inactive);
    }

    #[test]
    fn only_final_transcripts_accumulate_in_order() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);

        s.apply(&transcript_event("transcript", Some(TranscriptType::Partial), "he"));
        s.apply(&transcript_event("transcript", Some(TranscriptType::Final), "hello"));
        s.apply(&transcript_event("conversation-update", None, "ignored"));
        s.apply(&transcript_event("transcript", Some(TranscriptType::Final), "world"));

        let contents: Vec<&str> = s.transcript.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["hello", "world"]);
        assert_eq!(s.last_message().unwrap().content, "world");
    }

    #[test]
    fn speech_events_toggle_the_speaking_flag() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        s.apply(&VoiceEvent::SpeechStart);
        assert!(s.speaking);
        s.apply(&VoiceEvent::SpeechEnd);
        assert!(!s.speaking);
    }

    #[test]
    fn generate_mode_never_plans_feedback() {
        let interview_id = Some(Uuid::new_v4());
        assert_eq!(
            plan_exit(SessionMode::Generate, interview_id),
            ExitPlan::Route(ExitRoute::Home)
        );
        assert_eq!(
            plan_exit(SessionMode::Generate, None),
            ExitPlan::Route(ExitRoute::Home)
        );
    }

    #[test]
    fn interview_mode_plans_exactly_one_feedback_run() {
        let interview_id = Uuid::new_v4();
        assert_eq!(
            plan_exit(SessionMode::Interview, Some(interview_id)),
            ExitPlan::GenerateFeedback { interview_id }
        );
        assert_eq!(
            plan_exit(SessionMode::Interview, None),
            ExitPlan::Route(ExitRoute::Home)
        );
    }

    #[test]
    fn exit_route_is_write_once() {
        let mut s = session(SessionMode::Interview);
        s.begin("call-1".to_string());
        s.apply(&VoiceEvent::CallStart);
        s.apply(&VoiceEvent::CallEnd);

        let interview_id = s.interview_id.unwrap();
        s.resolve_exit(ExitRoute::Feedback { interview_id });
        s.resolve_exit(ExitRoute::Home);
        assert_eq!(s.exit, Some(ExitRoute::Feedback { interview_id }));
    }

    #[test]
    fn registry_resolves_provider_ids_and_prunes_terminal_sessions() {
        let mut registry = CallRegistry::default();

        let mut live = session(SessionMode::Interview);
        live.begin("call-live".to_string());
        live.apply(&VoiceEvent::CallStart);
        let live_id = live.id;

        let mut done = session(SessionMode::Interview);
        done.begin("call-done".to_string());
        done.apply(&VoiceEvent::CallStart);
        done.apply(&VoiceEvent::CallEnd);
        done.started_at = Utc::now() - Duration::hours(3);
        let done_id = done.id;

        registry.insert(live);
        registry.insert(done);
        assert_eq!(registry.resolve_provider("call-live"), Some(live_id));
        assert_eq!(registry.resolve_provider("call-done"), Some(done_id));

        let removed = registry.prune_terminal(Duration::hours(1));
        assert_eq!(removed, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&live_id).is_some());
        assert_eq!(registry.resolve_provider("call-done"), None);
    }
}
