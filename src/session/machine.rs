use serde::Serialize;
use tracing::debug;

use super::Notice;
use crate::capture::AudioChunk;
use crate::silence::{chunk_level, SilenceDetector};

/// Discrete state of a recording session.
///
/// Exactly one phase is active at a time. Recording is only ever re-entered
/// by passing through `Idle` first, which is also what guarantees the
/// previous recording's resources were released before a new one starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Nothing in flight; the only phase a new recording can start from
    Idle,
    /// Chunks are being captured and watched for silence
    Recording,
    /// The quiet period elapsed; waiting for the capture to flush and end
    SilenceDetected,
    /// One transcription request is in flight
    Transcribing,
    /// Transcript available for review, retry, or submit
    Ready,
}

/// Everything that can happen to a session
#[derive(Debug)]
pub enum SessionEvent {
    /// User action (or auto-start timer) asked for a recording
    StartRequested,
    /// The microphone could not be opened
    PermissionDenied,
    /// The backend is delivering chunks
    CaptureStarted,
    /// One chunk arrived from the backend
    ChunkCaptured(AudioChunk),
    /// User asked to stop the recording
    StopRequested,
    /// The chunk channel closed; every captured chunk has been flushed
    CaptureEnded,
    /// The transcription service answered (text may be empty)
    TranscriptReceived(String),
    /// The transcription request failed
    TranscriptFailed,
    /// User discarded the transcript to record again
    RetryRequested,
    /// User accepted the transcript
    SubmitRequested,
    /// The embedding UI is going away
    Shutdown,
}

/// Side effects the controller must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Open the microphone and start the chunk feed
    BeginCapture,
    /// Stop the backend; the chunk channel will close once flushed
    EndCapture,
    /// Submit the accumulated audio for transcription
    Transcribe(Vec<AudioChunk>),
    /// Hand the finalized text to the caller
    Deliver(String),
    /// Show a non-blocking notification
    Surface(Notice),
    /// Release any capture resources still held
    Release,
}

/// The recording phase machine.
///
/// Pure: transitions only mutate this struct and return actions, so the
/// whole table is testable without a microphone, a clock, or a network.
/// Chunk timestamps stand in for the clock.
pub struct SessionMachine {
    phase: Phase,
    // A BeginCapture was issued but the backend has not reported
    // CaptureStarted yet; further starts in this window are dropped
    start_pending: bool,
    chunks: Vec<AudioChunk>,
    transcribed_text: String,
    audio_level: f32,
    detector: SilenceDetector,
}

impl SessionMachine {
    pub fn new(noise_floor: f32, silence_threshold_ms: u64) -> Self {
        Self {
            phase: Phase::Idle,
            start_pending: false,
            chunks: Vec::new(),
            transcribed_text: String::new(),
            audio_level: 0.0,
            detector: SilenceDetector::new(noise_floor, silence_threshold_ms),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transcribed_text(&self) -> &str {
        &self.transcribed_text
    }

    pub fn audio_level(&self) -> f32 {
        self.audio_level
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Submit is only enabled with a reviewed, non-blank transcript
    pub fn can_submit(&self) -> bool {
        self.phase == Phase::Ready && !self.transcribed_text.trim().is_empty()
    }

    /// Apply one event and return the side effects to perform.
    ///
    /// Events that make no sense in the current phase are dropped; a late
    /// chunk after shutdown or a stale transcript result lands here and
    /// goes nowhere.
    pub fn transition(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        use Phase as P;
        use SessionAction as A;
        use SessionEvent as E;

        match (self.phase, event) {
            (P::Idle, E::StartRequested) => {
                if self.start_pending {
                    debug!("Ignoring start while a capture backend is opening");
                    return vec![];
                }
                self.start_pending = true;
                vec![A::BeginCapture]
            }

            (P::Idle, E::PermissionDenied) => {
                self.start_pending = false;
                vec![A::Surface(Notice::PermissionDenied), A::Release]
            }

            (P::Idle, E::CaptureStarted) => {
                self.start_pending = false;
                self.chunks.clear();
                self.transcribed_text.clear();
                self.audio_level = 0.0;
                self.detector.reset();
                self.phase = P::Recording;
                vec![]
            }

            (P::Recording, E::ChunkCaptured(chunk)) => {
                let level = chunk_level(&chunk.samples);
                let now_ms = chunk.timestamp_ms;
                self.audio_level = level;
                self.chunks.push(chunk);

                if self.detector.observe(level, now_ms) {
                    self.phase = P::SilenceDetected;
                    vec![A::EndCapture]
                } else {
                    vec![]
                }
            }

            // Chunks still flushing after the stop decision are kept
            (P::SilenceDetected, E::ChunkCaptured(chunk)) => {
                self.chunks.push(chunk);
                vec![]
            }

            (P::Recording, E::StopRequested) => vec![A::EndCapture],

            (P::Recording | P::SilenceDetected, E::CaptureEnded) => {
                self.audio_level = 0.0;
                if self.chunks.is_empty() {
                    self.phase = P::Idle;
                    vec![A::Surface(Notice::NoSpeechDetected), A::Release]
                } else {
                    self.phase = P::Transcribing;
                    vec![A::Transcribe(std::mem::take(&mut self.chunks))]
                }
            }

            (P::Transcribing, E::TranscriptReceived(text)) => {
                if text.trim().is_empty() {
                    // Service heard nothing: recoverable, not a failure
                    self.phase = P::Idle;
                    vec![A::Surface(Notice::NoSpeechDetected), A::Release]
                } else {
                    self.transcribed_text = text;
                    self.phase = P::Ready;
                    vec![]
                }
            }

            (P::Transcribing, E::TranscriptFailed) => {
                self.phase = P::Idle;
                vec![A::Surface(Notice::TranscriptionFailed), A::Release]
            }

            // A backend whose feed ended on its own may still sit in its
            // slot, so retry releases like every other exit path
            (P::Ready, E::RetryRequested) => {
                self.transcribed_text.clear();
                self.chunks.clear();
                self.audio_level = 0.0;
                self.phase = P::Idle;
                vec![A::Release]
            }

            (P::Ready, E::SubmitRequested) => {
                let text = self.transcribed_text.trim().to_string();
                if text.is_empty() {
                    return vec![];
                }
                self.transcribed_text.clear();
                self.phase = P::Idle;
                vec![A::Deliver(text), A::Release]
            }

            (_, E::Shutdown) => {
                self.start_pending = false;
                self.chunks.clear();
                self.transcribed_text.clear();
                self.audio_level = 0.0;
                self.phase = P::Idle;
                vec![A::Release]
            }

            (phase, event) => {
                debug!(?phase, ?event, "Ignoring event out of phase");
                vec![]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_chunk(timestamp_ms: u64) -> AudioChunk {
        AudioChunk {
            samples: vec![0i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }

    fn speech_chunk(timestamp_ms: u64) -> AudioChunk {
        AudioChunk {
            samples: vec![8000i16; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }

    fn recording_machine() -> SessionMachine {
        let mut machine = SessionMachine::new(0.05, 3000);
        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );
        assert!(machine.transition(SessionEvent::CaptureStarted).is_empty());
        assert_eq!(machine.phase(), Phase::Recording);
        machine
    }

    #[test]
    fn start_is_only_honored_from_idle() {
        let mut machine = recording_machine();
        // A second start while recording must not restart capture
        assert!(machine.transition(SessionEvent::StartRequested).is_empty());
        assert_eq!(machine.phase(), Phase::Recording);
    }

    #[test]
    fn second_start_while_the_backend_is_opening_is_dropped() {
        let mut machine = SessionMachine::new(0.05, 3000);
        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );

        // The backend has not reported CaptureStarted yet; a second start
        // in this window must not open a second backend
        assert!(machine.transition(SessionEvent::StartRequested).is_empty());

        machine.transition(SessionEvent::CaptureStarted);
        assert_eq!(machine.phase(), Phase::Recording);
    }

    #[test]
    fn denied_start_allows_a_fresh_attempt() {
        let mut machine = SessionMachine::new(0.05, 3000);
        machine.transition(SessionEvent::StartRequested);
        machine.transition(SessionEvent::PermissionDenied);

        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );
    }

    #[test]
    fn shutdown_while_the_backend_is_opening_clears_the_pending_start() {
        let mut machine = SessionMachine::new(0.05, 3000);
        machine.transition(SessionEvent::StartRequested);
        machine.transition(SessionEvent::Shutdown);

        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );
    }

    #[test]
    fn speech_holds_off_the_silence_stop() {
        let mut machine = recording_machine();

        for tick in 0..40 {
            let actions = machine.transition(SessionEvent::ChunkCaptured(speech_chunk(tick * 100)));
            assert!(actions.is_empty());
        }
        assert_eq!(machine.phase(), Phase::Recording);
    }

    #[test]
    fn sustained_silence_stops_the_recording() {
        let mut machine = recording_machine();

        let mut stopped = false;
        for tick in 0..=31 {
            let actions = machine.transition(SessionEvent::ChunkCaptured(silent_chunk(tick * 100)));
            if actions == vec![SessionAction::EndCapture] {
                stopped = true;
                assert!(tick * 100 > 3000, "stopped before the threshold");
                break;
            }
            assert!(actions.is_empty());
        }
        assert!(stopped, "silence never triggered a stop");
        assert_eq!(machine.phase(), Phase::SilenceDetected);
    }

    #[test]
    fn capture_end_with_audio_submits_for_transcription() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(100)));

        let actions = machine.transition(SessionEvent::CaptureEnded);
        match actions.as_slice() {
            [SessionAction::Transcribe(chunks)] => assert_eq!(chunks.len(), 2),
            other => panic!("expected Transcribe, got {other:?}"),
        }
        assert_eq!(machine.phase(), Phase::Transcribing);
    }

    #[test]
    fn capture_end_with_no_chunks_reports_no_speech() {
        let mut machine = recording_machine();

        let actions = machine.transition(SessionEvent::CaptureEnded);
        assert_eq!(
            actions,
            vec![
                SessionAction::Surface(Notice::NoSpeechDetected),
                SessionAction::Release
            ]
        );
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn trailing_chunks_flush_into_the_recording() {
        let mut machine = recording_machine();
        for tick in 0..=31 {
            machine.transition(SessionEvent::ChunkCaptured(silent_chunk(tick * 100)));
        }
        assert_eq!(machine.phase(), Phase::SilenceDetected);
        let before = machine.chunk_count();

        machine.transition(SessionEvent::ChunkCaptured(silent_chunk(3200)));
        assert_eq!(machine.chunk_count(), before + 1);
    }

    #[test]
    fn empty_transcript_returns_to_idle_without_text() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);

        let actions = machine.transition(SessionEvent::TranscriptReceived("".to_string()));
        assert_eq!(
            actions,
            vec![
                SessionAction::Surface(Notice::NoSpeechDetected),
                SessionAction::Release
            ]
        );
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.transcribed_text().is_empty());
        assert!(!machine.can_submit());
    }

    #[test]
    fn whitespace_transcript_counts_as_empty() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);

        machine.transition(SessionEvent::TranscriptReceived("   \n".to_string()));
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(!machine.can_submit());
    }

    #[test]
    fn transcript_failure_is_retryable_from_idle() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);

        let actions = machine.transition(SessionEvent::TranscriptFailed);
        assert_eq!(
            actions,
            vec![
                SessionAction::Surface(Notice::TranscriptionFailed),
                SessionAction::Release
            ]
        );
        assert_eq!(machine.phase(), Phase::Idle);

        // The user can start over
        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );
    }

    #[test]
    fn successful_transcript_reaches_ready() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);

        let actions =
            machine.transition(SessionEvent::TranscriptReceived("Hello there".to_string()));
        assert!(actions.is_empty());
        assert_eq!(machine.phase(), Phase::Ready);
        assert_eq!(machine.transcribed_text(), "Hello there");
        assert!(machine.can_submit());
    }

    #[test]
    fn submit_delivers_trimmed_text_and_finishes() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);
        machine.transition(SessionEvent::TranscriptReceived("  Hello there ".to_string()));

        let actions = machine.transition(SessionEvent::SubmitRequested);
        assert_eq!(
            actions,
            vec![
                SessionAction::Deliver("Hello there".to_string()),
                SessionAction::Release
            ]
        );
        assert_eq!(machine.phase(), Phase::Idle);

        // A second submit has nothing to deliver
        assert!(machine.transition(SessionEvent::SubmitRequested).is_empty());
    }

    #[test]
    fn retry_clears_transcript_and_chunks() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        machine.transition(SessionEvent::CaptureEnded);
        machine.transition(SessionEvent::TranscriptReceived("take one".to_string()));
        assert_eq!(machine.phase(), Phase::Ready);

        // Release fires even though the capture already ended, in case a
        // self-ending backend still sits in its slot
        let actions = machine.transition(SessionEvent::RetryRequested);
        assert_eq!(actions, vec![SessionAction::Release]);
        assert_eq!(machine.phase(), Phase::Idle);
        assert!(machine.transcribed_text().is_empty());
        assert_eq!(machine.chunk_count(), 0);

        // Recording is reachable again, but only through Idle
        assert_eq!(
            machine.transition(SessionEvent::StartRequested),
            vec![SessionAction::BeginCapture]
        );
        machine.transition(SessionEvent::CaptureStarted);
        assert_eq!(machine.phase(), Phase::Recording);
    }

    #[test]
    fn permission_denial_surfaces_and_releases() {
        let mut machine = SessionMachine::new(0.05, 3000);
        machine.transition(SessionEvent::StartRequested);

        let actions = machine.transition(SessionEvent::PermissionDenied);
        assert_eq!(
            actions,
            vec![
                SessionAction::Surface(Notice::PermissionDenied),
                SessionAction::Release
            ]
        );
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn shutdown_releases_from_any_phase() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));

        let actions = machine.transition(SessionEvent::Shutdown);
        assert_eq!(actions, vec![SessionAction::Release]);
        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(machine.chunk_count(), 0);

        // Late callbacks after teardown go nowhere
        assert!(machine
            .transition(SessionEvent::ChunkCaptured(speech_chunk(100)))
            .is_empty());
        assert!(machine
            .transition(SessionEvent::TranscriptReceived("stale".to_string()))
            .is_empty());
        assert!(machine.transition(SessionEvent::CaptureEnded).is_empty());
        assert_eq!(machine.phase(), Phase::Idle);
    }

    #[test]
    fn audio_level_tracks_the_latest_chunk() {
        let mut machine = recording_machine();
        machine.transition(SessionEvent::ChunkCaptured(speech_chunk(0)));
        assert!(machine.audio_level() > 0.05);

        machine.transition(SessionEvent::ChunkCaptured(silent_chunk(100)));
        assert_eq!(machine.audio_level(), 0.0);
    }
}
