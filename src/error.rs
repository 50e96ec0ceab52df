use thiserror::Error;

/// Failures surfaced by the live voice pipeline.
///
/// A remote close is not in here on purpose: the far end hanging up is a
/// normal session outcome and arrives as a transport event, not an error.
#[derive(Error, Debug)]
pub enum SessionError {
    /// An audio device could not be opened or configured.
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The live session could not be established.
    #[error("failed to open live session: {0}")]
    TransportOpen(String),

    /// The established session failed mid-flight.
    #[error("live session transport error: {0}")]
    Transport(String),

    /// start() was called on a session that already ran.
    #[error("session already started")]
    NotIdle,
}
