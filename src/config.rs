use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            port: default_http_port(),
        }
    }
}

/// Settings for the live voice session.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    /// WebSocket endpoint of the bidirectional generation service.
    #[serde(default = "default_live_endpoint")]
    pub live_endpoint: String,
    /// Native-audio model driving the conversation.
    #[serde(default = "default_voice_model")]
    pub model: String,
    /// Prebuilt voice used for replies.
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    /// Persona the assistant speaks with.
    #[serde(default = "default_voice_instruction")]
    pub system_instruction: String,
    /// Microphone frames buffered while the socket is slow.
    #[serde(default = "default_outbound_queue_frames")]
    pub outbound_queue_frames: usize,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            live_endpoint: default_live_endpoint(),
            model: default_voice_model(),
            voice_name: default_voice_name(),
            system_instruction: default_voice_instruction(),
            outbound_queue_frames: default_outbound_queue_frames(),
        }
    }
}

/// Settings for the REST chat and image endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_base_url")]
    pub base_url: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_assistant_base_url(),
            chat_model: default_chat_model(),
            image_model: default_image_model(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Where the ledger JSON lives.
    #[serde(default = "default_data_path")]
    pub data_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
        }
    }
}

impl Config {
    /// Load from a config file, falling back to defaults when it is absent.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

/// The API key is read from the environment only. It never lives in the
/// config file and must never be logged.
pub fn gemini_api_key() -> Option<String> {
    std::env::var("GEMINI_API_KEY")
        .or_else(|_| std::env::var("GOOGLE_API_KEY"))
        .ok()
        .filter(|key| !key.is_empty())
}

fn default_service_name() -> String {
    "obra-assist".to_string()
}

fn default_http_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_live_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_voice_model() -> String {
    "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_voice_name() -> String {
    "Kore".to_string()
}

fn default_voice_instruction() -> String {
    "Você é o Bill, um pintor experiente e amigável. Fale português do Brasil. Responda de forma curta e útil sobre pinturas, obras e materiais.".to_string()
}

fn default_outbound_queue_frames() -> usize {
    32
}

fn default_assistant_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_data_path() -> String {
    "data/ledger.json".to_string()
}
