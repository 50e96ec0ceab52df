// Speaker output for model speech.
//
// Same threading rule as capture: the cpal stream lives on its own thread
// and is kept alive by a channel recv. The async side only touches a
// shared sample queue; the device callback drains it and writes silence on
// underrun, so a late buffer produces a quiet gap instead of a glitch.
//
// Model speech arrives at 24 kHz; most output devices run at 44.1 or
// 48 kHz, so samples are linearly resampled once on enqueue.

use crate::error::SessionError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{error, info};

/// Where decoded model speech goes.
///
/// `clear` exists for barge-in: when the model is interrupted, queued
/// samples must stop playing immediately.
pub trait PlaybackSink: Send + Sync {
    /// Queue mono samples for playback.
    fn enqueue(&self, samples: &[i16]);

    /// Drop everything queued but keep the device open.
    fn clear(&self);

    /// Drop everything queued and release the device.
    fn close(&self);
}

/// Default-speaker sink.
pub struct SpeakerSink {
    source_rate: u32,
    device_rate: u32,
    closed: AtomicBool,
    queue: Arc<Mutex<VecDeque<i16>>>,
    stop_tx: Mutex<Option<std::sync::mpsc::Sender<()>>>,
}

impl SpeakerSink {
    /// Open the default output device and start the stream.
    ///
    /// `source_rate` is the rate of the samples that will be enqueued.
    pub async fn open(source_rate: u32) -> Result<Self, SessionError> {
        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
        let cb_queue = Arc::clone(&queue);

        thread::Builder::new()
            .name("speaker-out".to_string())
            .spawn(move || {
                let (stream, device_rate) = match open_output_stream(cb_queue) {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(SessionError::DeviceUnavailable(format!(
                        "failed to start output stream: {e}"
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(device_rate));

                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| {
                SessionError::DeviceUnavailable(format!("failed to spawn playback thread: {e}"))
            })?;

        let device_rate = match ready_rx.await {
            Ok(Ok(rate)) => rate,
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(SessionError::DeviceUnavailable(
                    "playback thread exited before the stream was ready".to_string(),
                ))
            }
        };

        info!(
            "Speaker playback opened: {} Hz source, {} Hz device",
            source_rate, device_rate
        );

        Ok(Self {
            source_rate,
            device_rate,
            closed: AtomicBool::new(false),
            queue,
            stop_tx: Mutex::new(Some(stop_tx)),
        })
    }
}

impl PlaybackSink for SpeakerSink {
    fn enqueue(&self, samples: &[i16]) {
        if self.closed.load(Ordering::SeqCst) || samples.is_empty() {
            return;
        }
        let device_samples = resample_linear(samples, self.source_rate, self.device_rate);
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.extend(device_samples);
    }

    fn clear(&self) {
        let mut queue = self.queue.lock().unwrap_or_else(|p| p.into_inner());
        queue.clear();
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.clear();
        // Dropping the sender releases the stream thread.
        let mut stop_tx = self.stop_tx.lock().unwrap_or_else(|p| p.into_inner());
        stop_tx.take();
        info!("Speaker playback closed");
    }
}

impl Drop for SpeakerSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Resolve the default output device and build the playback stream.
///
/// Must run on the thread that will own the stream. Returns the stream and
/// the device sample rate the queue must be filled at.
fn open_output_stream(
    queue: Arc<Mutex<VecDeque<i16>>>,
) -> Result<(cpal::Stream, u32), SessionError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| SessionError::DeviceUnavailable("no default output device".to_string()))?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let config = device.default_output_config().map_err(|e| {
        SessionError::DeviceUnavailable(format!("failed to query output config: {e}"))
    })?;
    if config.sample_format() != SampleFormat::F32 {
        return Err(SessionError::DeviceUnavailable(format!(
            "output device {} uses unsupported sample format {:?}",
            device_name,
            config.sample_format()
        )));
    }

    let device_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let stream_config: StreamConfig = config.config();

    info!(
        "Playing through {} at {} Hz, {} channel(s)",
        device_name, device_rate, channels
    );

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut queue = queue.lock().unwrap_or_else(|p| p.into_inner());
                for frame in data.chunks_mut(channels) {
                    let sample = queue
                        .pop_front()
                        .map(|s| s as f32 / 32768.0)
                        .unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| error!("Output stream error: {}", err),
            None,
        )
        .map_err(|e| {
            SessionError::DeviceUnavailable(format!("failed to build output stream: {e}"))
        })?;

    Ok((stream, device_rate))
}

/// Linear interpolation resample for mono buffers.
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx as usize;
        let frac = src_idx - idx0 as f64;
        let s0 = samples[idx0] as f64;
        let s1 = if idx0 + 1 < samples.len() {
            samples[idx0 + 1] as f64
        } else {
            s0
        };
        out.push((s0 + frac * (s1 - s0)).round() as i16);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0i16, 1000, -1000, 32767];
        assert_eq!(resample_linear(&samples, 24000, 24000), samples);
    }

    #[test]
    fn test_resample_doubles_length_on_2x_upsample() {
        let samples = vec![100i16; 2400];
        let out = resample_linear(&samples, 24000, 48000);
        assert_eq!(out.len(), 4800);
        // A constant signal stays constant under linear interpolation.
        assert!(out.iter().all(|&s| s == 100));
    }

    #[test]
    fn test_resample_halves_length_on_downsample() {
        let samples = vec![500i16; 4800];
        let out = resample_linear(&samples, 48000, 24000);
        assert_eq!(out.len(), 2400);
    }

    #[test]
    fn test_resample_interpolates_between_points() {
        // Upsampling a ramp should place midpoints between neighbours.
        let samples = vec![0i16, 100];
        let out = resample_linear(&samples, 1, 2);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], 0);
        assert_eq!(out[1], 50);
        assert_eq!(out[2], 100);
    }

    #[test]
    fn test_resample_empty_input() {
        assert!(resample_linear(&[], 24000, 48000).is_empty());
    }
}
