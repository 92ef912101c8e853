use anyhow::Result;
use chrono::Utc;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::machine::{SessionAction, SessionEvent, SessionMachine};
use super::{Notice, Phase, SessionOptions, SessionStats};
use crate::capture::{
    encode_wav, AudioChunk, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    PermissionGate, PermissionState,
};
use crate::transcribe::Transcriber;

/// Receives the finalized text, exactly once per submission.
/// The caller owns everything downstream: scoring, persistence, rewards.
pub type SubmitHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Optional hook for playing the caller's prompt out loud
pub type PromptHook = Arc<dyn Fn(&str) + Send + Sync>;

/// A voice input session: one user interaction from permission probe to
/// submitted text.
///
/// All mutable recording state lives in the phase machine; this controller
/// owns the capture backend, the transcriber, and the tasks that connect
/// them, and it guarantees the microphone is released on every exit path
/// through one idempotent release routine.
pub struct VoiceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    options: SessionOptions,
    source: CaptureSource,
    capture_config: CaptureConfig,
    machine: Mutex<SessionMachine>,
    backend: Mutex<Option<Box<dyn CaptureBackend>>>,
    gate: Mutex<PermissionGate>,
    transcriber: Arc<dyn Transcriber>,
    notice_tx: mpsc::UnboundedSender<Notice>,
    on_submit: SubmitHandler,
    prompt_hook: Mutex<Option<PromptHook>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
    started_at: chrono::DateTime<Utc>,
}

impl VoiceSession {
    /// Create a session; returns the notice receiver the embedding UI
    /// should drain for its toasts.
    pub fn new(
        source: CaptureSource,
        options: SessionOptions,
        transcriber: Arc<dyn Transcriber>,
        on_submit: SubmitHandler,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        Self::with_capture_config(source, options, CaptureConfig::default(), transcriber, on_submit)
    }

    pub fn with_capture_config(
        source: CaptureSource,
        options: SessionOptions,
        capture_config: CaptureConfig,
        transcriber: Arc<dyn Transcriber>,
        on_submit: SubmitHandler,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let machine = SessionMachine::new(
            options.noise_floor,
            options.silence_threshold.as_millis() as u64,
        );

        info!("Creating voice session: {}", options.session_id);

        let inner = Arc::new(SessionInner {
            options,
            source,
            capture_config,
            machine: Mutex::new(machine),
            backend: Mutex::new(None),
            gate: Mutex::new(PermissionGate::new()),
            transcriber,
            notice_tx,
            on_submit,
            prompt_hook: Mutex::new(None),
            pump_task: Mutex::new(None),
            started_at: Utc::now(),
        });

        (Self { inner }, notice_rx)
    }

    /// Install a playback hook for the caller's prompt text
    pub async fn set_prompt_hook(&self, hook: PromptHook) {
        *self.inner.prompt_hook.lock().await = Some(hook);
    }

    /// Play the configured prompt through the hook, if both are present
    pub async fn play_prompt(&self) {
        let hook = self.inner.prompt_hook.lock().await.clone();
        if let (Some(hook), Some(text)) = (hook, self.inner.options.prompt_text.as_deref()) {
            hook(text);
        }
    }

    /// Begin a recording. Honored only from `Idle`.
    pub async fn start(&self) {
        self.inner.dispatch(SessionEvent::StartRequested).await;
    }

    /// Fire the configured auto-start, at most once per session even if the
    /// embedding UI re-invokes it.
    pub async fn maybe_auto_start(&self) {
        if !self.inner.options.auto_start {
            return;
        }
        {
            let mut gate = self.inner.gate.lock().await;
            if !gate.mark_requested() {
                return;
            }
        }
        tokio::time::sleep(self.inner.options.auto_start_delay).await;
        self.inner.dispatch(SessionEvent::StartRequested).await;
    }

    /// Manually end the current recording and move on to transcription
    pub async fn stop(&self) {
        self.inner.dispatch(SessionEvent::StopRequested).await;
    }

    /// Discard the transcript and record again after the retry delay
    pub async fn retry(&self) {
        let was_ready = { self.inner.machine.lock().await.phase() == Phase::Ready };
        self.inner.dispatch(SessionEvent::RetryRequested).await;

        if was_ready {
            tokio::time::sleep(self.inner.options.retry_delay).await;
            self.inner.dispatch(SessionEvent::StartRequested).await;
        }
    }

    /// Deliver the reviewed transcript to the caller
    pub async fn submit(&self) {
        self.inner.dispatch(SessionEvent::SubmitRequested).await;
    }

    /// Tear the session down: release the microphone and stop every
    /// in-flight task. Safe to call more than once.
    pub async fn shutdown(&self) {
        self.inner.dispatch(SessionEvent::Shutdown).await;
        self.inner.release_backend().await;

        let pump = { self.inner.pump_task.lock().await.take() };
        if let Some(pump) = pump {
            pump.abort();
            let _ = pump.await;
        }

        info!("Voice session shut down: {}", self.inner.options.session_id);
    }

    pub async fn phase(&self) -> Phase {
        self.inner.machine.lock().await.phase()
    }

    pub async fn transcribed_text(&self) -> String {
        self.inner.machine.lock().await.transcribed_text().to_string()
    }

    pub async fn can_submit(&self) -> bool {
        self.inner.machine.lock().await.can_submit()
    }

    pub async fn permission(&self) -> PermissionState {
        self.inner.gate.lock().await.state()
    }

    /// Forget a denial so the next start probes the microphone again
    pub async fn request_permission_again(&self) {
        self.inner.gate.lock().await.reset();
    }

    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    pub async fn stats(&self) -> SessionStats {
        let machine = self.inner.machine.lock().await;
        let duration = Utc::now().signed_duration_since(self.inner.started_at);

        SessionStats {
            session_id: self.inner.options.session_id.clone(),
            phase: machine.phase(),
            started_at: self.inner.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunk_count: machine.chunk_count(),
            audio_level: machine.audio_level(),
            mic_permission: self.inner.gate.lock().await.state(),
            can_submit: machine.can_submit(),
        }
    }
}

impl SessionInner {
    /// Feed one event to the machine and perform whatever it asks for.
    ///
    /// Actions can produce follow-up events (a capture end leads to a
    /// transcription, whose result is another event); the work queue keeps
    /// this iterative instead of recursive.
    ///
    /// Returns a boxed future: the call graph cycles through itself
    /// (`begin_capture` spawns a pump that dispatches again), so the
    /// recursion point needs a type-erased signature.
    fn dispatch<'a>(
        self: &'a Arc<Self>,
        event: SessionEvent,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let actions = { self.machine.lock().await.transition(event) };
            self.perform(actions).await;
        })
    }

    async fn perform(self: &Arc<Self>, actions: Vec<SessionAction>) {
        let mut queue: VecDeque<SessionAction> = actions.into();

        while let Some(action) = queue.pop_front() {
            let follow_up: Vec<SessionEvent> = match action {
                SessionAction::BeginCapture => self.begin_capture().await,
                SessionAction::EndCapture => {
                    self.release_backend().await;
                    vec![]
                }
                SessionAction::Transcribe(chunks) => self.run_transcription(chunks).await,
                SessionAction::Deliver(text) => {
                    info!("Delivering {} chars to the caller", text.len());
                    (self.on_submit)(text);
                    vec![]
                }
                SessionAction::Surface(notice) => {
                    warn!("{}", notice.user_message());
                    let _ = self.notice_tx.send(notice);
                    vec![]
                }
                SessionAction::Release => {
                    self.release_backend().await;
                    vec![]
                }
            };

            for event in follow_up {
                let more = { self.machine.lock().await.transition(event) };
                queue.extend(more);
            }
        }
    }

    /// Probe permission, open the backend, and start pumping chunks
    async fn begin_capture(self: &Arc<Self>) -> Vec<SessionEvent> {
        {
            let gate = self.gate.lock().await;
            if gate.state() == PermissionState::Denied {
                // Sticky denial: straight back to the fallback
                return vec![SessionEvent::PermissionDenied];
            }
        }

        let mut backend = match CaptureBackendFactory::create(
            self.source.clone(),
            self.capture_config.clone(),
        ) {
            Ok(backend) => {
                self.gate.lock().await.grant();
                backend
            }
            Err(err) => {
                warn!("Microphone unavailable: {err:#}");
                self.gate.lock().await.deny();
                return vec![SessionEvent::PermissionDenied];
            }
        };

        info!("Capture backend '{}' starting", backend.name());
        let chunk_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(err) => {
                error!("Capture backend failed to start: {err:#}");
                self.gate.lock().await.deny();
                return vec![SessionEvent::PermissionDenied];
            }
        };

        *self.backend.lock().await = Some(backend);

        // Enter Recording before the pump runs so no chunk arrives in Idle
        {
            let actions = {
                self.machine
                    .lock()
                    .await
                    .transition(SessionEvent::CaptureStarted)
            };
            debug_assert!(actions.is_empty());
        }

        let inner = Arc::clone(self);
        let pump = tokio::spawn(async move {
            inner.pump_chunks(chunk_rx).await;
        });
        *self.pump_task.lock().await = Some(pump);

        vec![]
    }

    /// Drives the session from the chunk feed. The channel closing is the
    /// flush barrier: every chunk sent before the backend stopped has been
    /// seen once `CaptureEnded` fires.
    async fn pump_chunks(self: Arc<Self>, mut chunk_rx: mpsc::Receiver<AudioChunk>) {
        while let Some(chunk) = chunk_rx.recv().await {
            self.dispatch(SessionEvent::ChunkCaptured(chunk)).await;
        }
        self.dispatch(SessionEvent::CaptureEnded).await;
    }

    async fn run_transcription(&self, chunks: Vec<AudioChunk>) -> Vec<SessionEvent> {
        let wav = match encode_wav(&chunks) {
            Ok(wav) => wav,
            Err(err) => {
                error!("Failed to assemble WAV payload: {err:#}");
                return vec![SessionEvent::TranscriptFailed];
            }
        };

        match self.transcriber.transcribe(wav).await {
            Ok(text) => vec![SessionEvent::TranscriptReceived(text)],
            Err(err) => {
                error!("Transcription failed: {err:#}");
                vec![SessionEvent::TranscriptFailed]
            }
        }
    }

    /// Idempotent: the backend is taken out of its slot, so a second call
    /// on any exit path finds nothing to stop.
    async fn release_backend(&self) {
        let backend = { self.backend.lock().await.take() };
        if let Some(mut backend) = backend {
            if let Err(err) = backend.stop().await {
                error!("Failed to stop capture backend: {err:#}");
            }
        }
    }
}

impl std::fmt::Debug for VoiceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSession")
            .field("session_id", &self.inner.options.session_id)
            .finish()
    }
}

/// Convenience used by the demo binary: run a session to completion over a
/// finite source, auto-submitting when the transcript is ready.
pub async fn run_to_completion(session: &VoiceSession) -> Result<()> {
    session.start().await;

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        match session.phase().await {
            Phase::Ready => {
                session.submit().await;
                return Ok(());
            }
            Phase::Idle => return Ok(()),
            _ => {}
        }
    }
}
