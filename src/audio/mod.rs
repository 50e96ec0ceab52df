pub mod capture;
pub mod pcm;
pub mod playback;
pub mod scheduler;

pub use capture::{CaptureBackend, CaptureFrame, MicrophoneBackend};
pub use playback::{PlaybackSink, SpeakerSink};
pub use scheduler::{Clock, MonotonicClock, PlaybackScheduler};
