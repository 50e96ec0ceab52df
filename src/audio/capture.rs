// Microphone capture for the live voice session.
//
// The device is driven by cpal on a dedicated thread (cpal streams are not
// Send, so the stream must live where it was built). The callback batches
// raw float samples into fixed 4096-sample frames, converts them to 16-bit
// PCM, and hands them to the async side over a bounded channel. If the
// consumer falls behind, frames are dropped with a warning: stale audio is
// worse than missing audio in a live conversation.

use super::pcm;
use crate::error::SessionError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, info, warn};

/// Frames buffered between the capture thread and the session pump.
const CAPTURE_CHANNEL_CAPACITY: usize = 100;

/// One microphone frame ready for the wire.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Fixed-point mono samples, [`pcm::SAMPLES_PER_FRAME`] long.
    pub samples: Vec<i16>,
    /// Input level of the frame, scaled to [0.0, 1.0].
    pub level: f32,
}

/// Audio capture backend trait.
///
/// The production implementation talks to the default microphone through
/// cpal; tests substitute scripted backends.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio.
    ///
    /// Returns a channel receiver that will receive capture frames.
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>, SessionError>;

    /// Stop capturing audio and release the device.
    async fn stop(&mut self) -> Result<(), SessionError>;

    /// Check if the backend is currently capturing.
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging.
    fn name(&self) -> &str;
}

/// Default-microphone backend: 16 kHz mono f32 input, framed and converted
/// on the stream thread.
pub struct MicrophoneBackend {
    capturing: Arc<AtomicBool>,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new() -> Self {
        Self {
            capturing: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            thread: None,
        }
    }
}

impl Default for MicrophoneBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<CaptureFrame>, SessionError> {
        if self.capturing.load(Ordering::SeqCst) {
            return Err(SessionError::DeviceUnavailable(
                "microphone capture already running".to_string(),
            ));
        }

        let (frame_tx, frame_rx) = mpsc::channel(CAPTURE_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        self.capturing.store(true, Ordering::SeqCst);
        let capturing = Arc::clone(&self.capturing);

        let thread = thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match open_input_stream(capturing, frame_tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                        "failed to start input stream: {e}"
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until stop() drops the sender.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| {
                SessionError::DeviceUnavailable(format!("failed to spawn capture thread: {e}"))
            })?;

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                self.capturing.store(false, Ordering::SeqCst);
                let _ = thread.join();
                return Err(SessionError::DeviceUnavailable(
                    "capture thread exited before the stream was ready".to_string(),
                ));
            }
        }

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);

        info!(
            "Microphone capture started: {} samples per frame at {} Hz",
            pcm::SAMPLES_PER_FRAME,
            pcm::CAPTURE_SAMPLE_RATE
        );

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<(), SessionError> {
        if !self.capturing.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        // Dropping the sender unblocks the stream thread, which drops the
        // stream and exits.
        self.stop_tx.take();

        if let Some(handle) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    error!("Capture thread panicked during shutdown");
                }
            })
            .await;
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "cpal-microphone"
    }
}

impl Drop for MicrophoneBackend {
    fn drop(&mut self) {
        self.capturing.store(false, Ordering::SeqCst);
        self.stop_tx.take();
    }
}

/// Resolve the default input device and build the capture stream.
///
/// Must run on the thread that will own the stream.
fn open_input_stream(
    capturing: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<CaptureFrame>,
) -> Result<cpal::Stream, SessionError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| SessionError::DeviceUnavailable("no default input device".to_string()))?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let supported = device
        .supported_input_configs()
        .map_err(|e| {
            SessionError::DeviceUnavailable(format!("failed to query input configs: {e}"))
        })?
        .find(|range| {
            range.sample_format() == SampleFormat::F32
                && range.min_sample_rate().0 <= pcm::CAPTURE_SAMPLE_RATE
                && pcm::CAPTURE_SAMPLE_RATE <= range.max_sample_rate().0
        })
        .ok_or_else(|| {
            SessionError::DeviceUnavailable(format!(
                "device {} does not support {} Hz f32 input",
                device_name,
                pcm::CAPTURE_SAMPLE_RATE
            ))
        })?;

    let mut config: StreamConfig = supported
        .with_sample_rate(SampleRate(pcm::CAPTURE_SAMPLE_RATE))
        .config();
    // Mono is requested from the device; no downmix path here.
    config.channels = 1;

    info!(
        "Capturing from {} at {} Hz mono",
        device_name, config.sample_rate.0
    );

    let mut pending: Vec<f32> = Vec::with_capacity(pcm::SAMPLES_PER_FRAME * 2);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if !capturing.load(Ordering::SeqCst) {
                    return;
                }
                pending.extend_from_slice(data);
                while pending.len() >= pcm::SAMPLES_PER_FRAME {
                    let chunk: Vec<f32> = pending.drain(..pcm::SAMPLES_PER_FRAME).collect();
                    let frame = CaptureFrame {
                        level: pcm::rms_level(&chunk),
                        samples: pcm::to_i16(&chunk),
                    };
                    match frame_tx.try_send(frame) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("Capture channel full - dropping audio frame");
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
            },
            |err| error!("Input stream error: {}", err),
            None,
        )
        .map_err(|e| {
            SessionError::DeviceUnavailable(format!("failed to build input stream: {e}"))
        })?;

    Ok(stream)
}
