pub mod capture;
pub mod config;
pub mod fallback;
pub mod session;
pub mod silence;
pub mod transcribe;

pub use capture::{
    encode_wav, AudioChunk, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    FileCapture, MicrophoneCapture, PermissionGate, PermissionState, ScriptedCapture, ScriptedFeed,
};
pub use config::Config;
pub use fallback::TypedInput;
pub use session::{
    Notice, Phase, SessionAction, SessionEvent, SessionMachine, SessionOptions, SessionStats,
    SubmitHandler, VoiceSession,
};
pub use silence::{chunk_level, SilenceDetector};
pub use transcribe::{HttpTranscriber, TranscribeRequest, TranscribeResponse, Transcriber};
