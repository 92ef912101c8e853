//! Voice input session management
//!
//! This module provides the `VoiceSession` abstraction that manages:
//! - The recording phase machine (idle → recording → transcribing → ready)
//! - Microphone permission gating with a typed-fallback route on denial
//! - Silence-triggered auto-stop while recording
//! - Transcription submission and review/retry/submit of the result
//! - Resource release on every exit path

mod config;
mod machine;
mod notice;
mod session;
mod stats;

pub use config::SessionOptions;
pub use machine::{Phase, SessionAction, SessionEvent, SessionMachine};
pub use notice::Notice;
pub use session::{run_to_completion, PromptHook, SubmitHandler, VoiceSession};
pub use stats::SessionStats;
