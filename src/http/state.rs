use crate::assistant::AssistantClient;
use crate::live::VoiceAssistant;
use crate::store::Ledger;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Business records, persisted on every mutation
    pub ledger: Arc<RwLock<Ledger>>,
    /// Supervisor for the single live voice session
    pub voice: Arc<VoiceAssistant>,
    /// Chat/image client; None when no API key is configured
    pub assistant: Option<Arc<AssistantClient>>,
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        voice: VoiceAssistant,
        assistant: Option<AssistantClient>,
    ) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            voice: Arc::new(voice),
            assistant: assistant.map(Arc::new),
        }
    }
}
