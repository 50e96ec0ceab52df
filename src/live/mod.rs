//! Live voice session management
//!
//! This module provides the real-time voice assistant pipeline:
//! - Microphone frames encoded and streamed to the live model endpoint
//! - Model speech decoded, scheduled gaplessly, and played back
//! - Barge-in interruptions that cut playback immediately
//! - Session lifecycle with ordered teardown and status reporting

pub mod messages;
pub mod session;
pub mod stats;
pub mod transport;

pub use session::{LiveSession, LiveSessionFactory, SessionFactory, VoiceAssistant};
pub use stats::{SessionCounters, SessionSnapshot, SessionStatus};
pub use transport::{LiveConnection, LiveConnector, LiveHandle, TransportEvent, WsLiveConnector};
