use crate::domain::session::CallRegistry;
use crate::services::ai::AiService;
use crate::voice::VoiceClient;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct AppState {
    pub pool: PgPool,
    pub ai: Arc<AiService>,
    /// Absent when the voice collaborator is unconfigured; starting a call
    /// then fails with a configuration error instead of a session attempt.
    pub voice: Option<Arc<dyn VoiceClient>>,
    pub session_key: Vec<u8>,
    pub webhook_secret: Option<String>,
    pub calls: Arc<RwLock<CallRegistry>>,
}

pub type SharedState = Arc<AppState>;
