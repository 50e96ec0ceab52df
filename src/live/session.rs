use super::messages::{self, ServerMessage, SessionSetup};
use super::stats::{SessionCounters, SessionSnapshot, SessionStatus};
use super::transport::{LiveConnector, LiveHandle, TransportEvent, WsLiveConnector};
use crate::audio::pcm;
use crate::audio::{
    CaptureBackend, Clock, MicrophoneBackend, MonotonicClock, PlaybackScheduler, PlaybackSink,
    SpeakerSink,
};
use crate::config::VoiceConfig;
use crate::error::SessionError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often the event loop retires finished playback buffers.
const DRAIN_TICK: Duration = Duration::from_millis(50);

/// State shared between the session and its pump tasks.
struct SessionCore {
    capture: Mutex<Box<dyn CaptureBackend>>,
    sink: Box<dyn PlaybackSink>,
    scheduler: Mutex<PlaybackScheduler>,
    handle: Mutex<Option<Arc<dyn LiveHandle>>>,
    status: Mutex<SessionStatus>,
    status_tx: mpsc::UnboundedSender<SessionStatus>,
    active: AtomicBool,
    /// f32 bits of the latest frame's input level.
    input_level: AtomicU32,
    counters: SessionCounters,
}

impl SessionCore {
    async fn status(&self) -> SessionStatus {
        *self.status.lock().await
    }

    /// Record a status change. Consecutive repeats are collapsed so a
    /// burst of audio messages reports `speaking` once.
    async fn set_status(&self, next: SessionStatus) {
        let mut status = self.status.lock().await;
        if *status == next {
            return;
        }
        debug!("Session status: {} -> {}", *status, next);
        *status = next;
        let _ = self.status_tx.send(next);
    }

    /// Release everything the session holds, in a fixed order. Each step
    /// tolerates the previous ones having failed or never run.
    async fn teardown(&self) {
        // Cut playback first so stale speech stops immediately.
        self.sink.clear();
        self.scheduler.lock().await.interrupt();

        // Release the microphone.
        {
            let mut capture = self.capture.lock().await;
            if let Err(e) = capture.stop().await {
                warn!("Capture stop failed during teardown: {}", e);
            }
        }

        // Close the transport if it ever opened.
        if let Some(handle) = self.handle.lock().await.take() {
            handle.close();
        }

        // Release the speaker.
        self.sink.close();

        // Leave the playback cursor clean.
        self.scheduler.lock().await.reset();
    }

    /// React to one decoded server message.
    async fn handle_message(&self, msg: ServerMessage) {
        if let Some(data) = msg.audio_data() {
            match messages::decode_audio(data) {
                Ok(bytes) => {
                    let samples = pcm::from_le_bytes(&bytes);
                    let duration = pcm::duration_of(samples.len(), pcm::PLAYBACK_SAMPLE_RATE);
                    let scheduled = self.scheduler.lock().await.schedule(duration);
                    if scheduled.is_some() {
                        self.sink.enqueue(&samples);
                        self.counters
                            .buffers_scheduled
                            .fetch_add(1, Ordering::Relaxed);
                        self.set_status(SessionStatus::Speaking).await;
                    }
                }
                // A bad payload loses one buffer, not the session.
                Err(e) => warn!("Dropping undecodable audio payload: {}", e),
            }
        }

        if msg.is_interrupted() {
            self.sink.clear();
            let cut = self.scheduler.lock().await.interrupt();
            self.counters.interruptions.fetch_add(1, Ordering::Relaxed);
            debug!("Model interrupted; {} buffer(s) cut off", cut);
            self.set_status(SessionStatus::Listening).await;
        }
    }
}

/// One live voice conversation.
///
/// A controller runs at most one session over its lifetime: construct,
/// start, stop, discard. [`VoiceAssistant`] layers the at-most-one-active
/// policy on top and hands out fresh controllers.
pub struct LiveSession {
    core: Arc<SessionCore>,
    connector: Arc<dyn LiveConnector>,
    setup: SessionSetup,
    started_at: DateTime<Utc>,
    started: AtomicBool,
    status_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionStatus>>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSession {
    pub fn new(
        capture: Box<dyn CaptureBackend>,
        sink: Box<dyn PlaybackSink>,
        connector: Arc<dyn LiveConnector>,
        clock: Arc<dyn Clock>,
        setup: SessionSetup,
    ) -> Self {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        Self {
            core: Arc::new(SessionCore {
                capture: Mutex::new(capture),
                sink,
                scheduler: Mutex::new(PlaybackScheduler::new(clock)),
                handle: Mutex::new(None),
                status: Mutex::new(SessionStatus::Idle),
                status_tx,
                active: AtomicBool::new(false),
                input_level: AtomicU32::new(0),
                counters: SessionCounters::default(),
            }),
            connector,
            setup,
            started_at: Utc::now(),
            started: AtomicBool::new(false),
            status_rx: Mutex::new(Some(status_rx)),
            pump_task: Mutex::new(None),
            event_task: Mutex::new(None),
        }
    }

    /// Take the ordered status event stream. Available once.
    pub async fn status_events(&self) -> Option<mpsc::UnboundedReceiver<SessionStatus>> {
        self.status_rx.lock().await.take()
    }

    /// Current lifecycle status.
    pub async fn status(&self) -> SessionStatus {
        self.core.status().await
    }

    /// Input level of the latest captured frame, 0.0 to 1.0.
    pub fn input_level(&self) -> f32 {
        f32::from_bits(self.core.input_level.load(Ordering::Relaxed))
    }

    /// Start the session.
    ///
    /// Acquires the microphone, opens the transport, then spawns the two
    /// pumps: capture frames out, server events in. Valid once per
    /// controller; a failure releases whatever was acquired and leaves the
    /// session in the error state.
    pub async fn start(&self) -> Result<(), SessionError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SessionError::NotIdle);
        }

        self.core.set_status(SessionStatus::Connecting).await;

        let frames = {
            let mut capture = self.core.capture.lock().await;
            match capture.start().await {
                Ok(rx) => rx,
                Err(e) => {
                    error!("Failed to start capture: {}", e);
                    self.core.set_status(SessionStatus::Error).await;
                    self.core.teardown().await;
                    return Err(e);
                }
            }
        };

        let connection = match self.connector.open(self.setup.clone()).await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to open live session: {}", e);
                self.core.set_status(SessionStatus::Error).await;
                self.core.teardown().await;
                return Err(e);
            }
        };

        let handle = Arc::clone(&connection.handle);
        *self.core.handle.lock().await = Some(Arc::clone(&handle));
        self.core.active.store(true, Ordering::SeqCst);

        // Outbound pump: microphone frames -> base64 -> transport.
        let core = Arc::clone(&self.core);
        let mut frames = frames;
        let pump = tokio::spawn(async move {
            debug!("Outbound audio pump started");
            while let Some(frame) = frames.recv().await {
                if !core.active.load(Ordering::SeqCst) {
                    break;
                }
                core.input_level
                    .store(frame.level.to_bits(), Ordering::Relaxed);
                let encoded = messages::encode_audio(&pcm::to_le_bytes(&frame.samples));
                if handle.send_frame(encoded) {
                    core.counters.frames_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    core.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            debug!("Outbound audio pump stopped");
        });
        *self.pump_task.lock().await = Some(pump);

        // Inbound loop: transport events drive status and playback. The
        // drain tick retires finished buffers so `speaking` falls back to
        // `listening` when the line empties.
        let core = Arc::clone(&self.core);
        let mut events = connection.events;
        let event_task = tokio::spawn(async move {
            let mut drain = tokio::time::interval(DRAIN_TICK);
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(TransportEvent::Opened) => {
                            info!("Live session established");
                            core.set_status(SessionStatus::Listening).await;
                        }
                        Some(TransportEvent::Message(msg)) => {
                            core.handle_message(msg).await;
                        }
                        Some(TransportEvent::Closed) => {
                            info!("Live session closed by server");
                            core.active.store(false, Ordering::SeqCst);
                            core.teardown().await;
                            core.set_status(SessionStatus::Disconnected).await;
                            break;
                        }
                        Some(TransportEvent::Error(e)) => {
                            error!("Live session error: {}", e);
                            core.active.store(false, Ordering::SeqCst);
                            core.teardown().await;
                            core.set_status(SessionStatus::Error).await;
                            break;
                        }
                        None => {
                            if core.active.swap(false, Ordering::SeqCst) {
                                warn!("Transport event stream ended without a close event");
                                core.teardown().await;
                                core.set_status(SessionStatus::Disconnected).await;
                            }
                            break;
                        }
                    },
                    _ = drain.tick() => {
                        if !core.active.load(Ordering::SeqCst) {
                            break;
                        }
                        let remaining = core.scheduler.lock().await.finish_elapsed();
                        if remaining == 0 && core.status().await == SessionStatus::Speaking {
                            core.set_status(SessionStatus::Listening).await;
                        }
                    }
                }
            }
            debug!("Session event loop stopped");
        });
        *self.event_task.lock().await = Some(event_task);

        Ok(())
    }

    /// Stop the session and release everything, in order.
    ///
    /// Idempotent: once the session is idle, further calls observe that
    /// and return without side effects.
    pub async fn stop(&self) {
        let was_active = self.core.active.swap(false, Ordering::SeqCst);
        if !was_active && self.core.status().await == SessionStatus::Idle {
            return;
        }

        info!("Stopping live session");
        self.core.teardown().await;

        // Reap the pumps; both exit once the capture channel closes and
        // the active flag is down.
        if let Some(task) = self.pump_task.lock().await.take() {
            if task.await.is_err() {
                error!("Audio pump task panicked");
            }
        }
        if let Some(task) = self.event_task.lock().await.take() {
            if task.await.is_err() {
                error!("Event loop task panicked");
            }
        }

        self.core.set_status(SessionStatus::Idle).await;
        info!("Live session stopped");
    }

    /// Point-in-time view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let duration = Utc::now().signed_duration_since(self.started_at);
        SessionSnapshot {
            status: self.core.status().await,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            input_level: self.input_level(),
            frames_sent: self.core.counters.frames_sent.load(Ordering::Relaxed),
            frames_dropped: self.core.counters.frames_dropped.load(Ordering::Relaxed),
            buffers_scheduled: self
                .core
                .counters
                .buffers_scheduled
                .load(Ordering::Relaxed),
            interruptions: self.core.counters.interruptions.load(Ordering::Relaxed),
        }
    }
}

/// Builds the moving parts of a live session.
///
/// A trait so tests can hand the supervisor scripted sessions.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn build(&self) -> Result<LiveSession, SessionError>;
}

/// Production factory: default microphone, default speaker, WebSocket
/// connector, wall-clock scheduler.
pub struct LiveSessionFactory {
    cfg: VoiceConfig,
    api_key: Option<String>,
}

impl LiveSessionFactory {
    pub fn new(cfg: VoiceConfig, api_key: Option<String>) -> Self {
        Self { cfg, api_key }
    }
}

#[async_trait::async_trait]
impl SessionFactory for LiveSessionFactory {
    async fn build(&self) -> Result<LiveSession, SessionError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            SessionError::TransportOpen("GEMINI_API_KEY is not set".to_string())
        })?;

        // Open the speaker first; start() failures tear it down with
        // everything else.
        let sink = SpeakerSink::open(pcm::PLAYBACK_SAMPLE_RATE).await?;
        let capture = MicrophoneBackend::new();
        let connector = WsLiveConnector::new(
            &self.cfg.live_endpoint,
            api_key,
            self.cfg.outbound_queue_frames,
        );
        let setup = SessionSetup::new(
            &self.cfg.model,
            &self.cfg.voice_name,
            &self.cfg.system_instruction,
        );

        Ok(LiveSession::new(
            Box::new(capture),
            Box::new(sink),
            Arc::new(connector),
            Arc::new(MonotonicClock::new()),
            setup,
        ))
    }
}

/// Supervisor holding at most one live session.
pub struct VoiceAssistant {
    factory: Arc<dyn SessionFactory>,
    slot: Mutex<Option<LiveSession>>,
}

impl VoiceAssistant {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Production assembly from configuration.
    pub fn from_config(cfg: VoiceConfig, api_key: Option<String>) -> Self {
        Self::new(Arc::new(LiveSessionFactory::new(cfg, api_key)))
    }

    /// Start a session, replacing any active one.
    ///
    /// The previous session is fully stopped before the new one starts,
    /// so two sessions never hold the microphone at once. A session that
    /// fails to start stays in the slot so its error status is visible.
    pub async fn start(&self) -> Result<SessionSnapshot, SessionError> {
        let mut slot = self.slot.lock().await;

        if let Some(prev) = slot.take() {
            info!("Replacing active voice session");
            prev.stop().await;
        }

        let session = self.factory.build().await?;
        let result = session.start().await;
        let snapshot = session.snapshot().await;
        *slot = Some(session);
        result.map(|()| snapshot)
    }

    /// Stop and discard the current session. Returns its final snapshot,
    /// or None when none was running.
    pub async fn stop(&self) -> Option<SessionSnapshot> {
        let mut slot = self.slot.lock().await;
        match slot.take() {
            Some(session) => {
                session.stop().await;
                Some(session.snapshot().await)
            }
            None => None,
        }
    }

    /// Snapshot of the current session, or the idle placeholder.
    pub async fn status(&self) -> SessionSnapshot {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some(session) => session.snapshot().await,
            None => SessionSnapshot::idle(),
        }
    }
}
