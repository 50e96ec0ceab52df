pub mod assistant;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod live;
pub mod store;

pub use assistant::AssistantClient;
pub use audio::{
    CaptureBackend, CaptureFrame, Clock, MicrophoneBackend, MonotonicClock, PlaybackScheduler,
    PlaybackSink, SpeakerSink,
};
pub use config::Config;
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use live::{
    LiveSession, SessionFactory, SessionSnapshot, SessionStatus, VoiceAssistant,
};
pub use store::{Ledger, Material, Payment, Project, ProjectStatus};
