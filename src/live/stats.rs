use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::AtomicU64;

/// Lifecycle of a live voice session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No session running.
    Idle,
    /// start() accepted, resources being acquired.
    Connecting,
    /// Session open, microphone streaming, line silent.
    Listening,
    /// Model speech is scheduled or playing.
    Speaking,
    /// The far end closed the session.
    Disconnected,
    /// The session failed.
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Listening => "listening",
            SessionStatus::Speaking => "speaking",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters the session tasks bump as they run.
#[derive(Debug, Default)]
pub struct SessionCounters {
    /// Microphone frames delivered to the transport
    pub frames_sent: AtomicU64,

    /// Microphone frames dropped on a full outbound queue
    pub frames_dropped: AtomicU64,

    /// Model speech buffers scheduled for playback
    pub buffers_scheduled: AtomicU64,

    /// Barge-in interruptions handled
    pub interruptions: AtomicU64,
}

/// Point-in-time view of a session, served over the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current lifecycle status
    pub status: SessionStatus,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub duration_secs: f64,

    /// Microphone level of the latest frame (0.0 to 1.0)
    pub input_level: f32,

    /// Microphone frames delivered to the transport
    pub frames_sent: u64,

    /// Microphone frames dropped on a full outbound queue
    pub frames_dropped: u64,

    /// Model speech buffers scheduled for playback
    pub buffers_scheduled: u64,

    /// Barge-in interruptions handled
    pub interruptions: u64,
}

impl SessionSnapshot {
    /// The view reported when no session exists.
    pub fn idle() -> Self {
        Self {
            status: SessionStatus::Idle,
            started_at: Utc::now(),
            duration_secs: 0.0,
            input_level: 0.0,
            frames_sent: 0,
            frames_dropped: 0,
            buffers_scheduled: 0,
            interruptions: 0,
        }
    }
}
