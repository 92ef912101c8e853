//! Transcription submission
//!
//! Converts a finished recording into text by posting it to the external
//! speech-to-text endpoint. The service is a black box: it gets base64 WAV
//! audio and returns text, which may legitimately be empty for a silent
//! recording.

mod client;
mod messages;

pub use client::{HttpTranscriber, Transcriber};
pub use messages::{TranscribeRequest, TranscribeResponse};
