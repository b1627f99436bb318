use crate::config::Settings;
use crate::session::RecordingSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Active recording sessions (recording_id -> session)
    pub sessions: Arc<RwLock<HashMap<String, Arc<RecordingSession>>>>,
    /// Settings used to build new sessions
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(settings),
        }
    }
}
