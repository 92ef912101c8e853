use serde::Serialize;

/// Non-blocking, user-visible notification.
///
/// The crate-level analog of a toast: every failure inside the session is
/// translated into one of these and delivered over the notice channel, so
/// the embedding UI never has to handle this subsystem's internal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// Microphone unavailable; only the typed fallback remains
    PermissionDenied,
    /// The recording or its transcript contained no speech (expected,
    /// recoverable)
    NoSpeechDetected,
    /// The transcription service failed; the user may re-record
    TranscriptionFailed,
}

impl Notice {
    pub fn user_message(&self) -> &'static str {
        match self {
            Notice::PermissionDenied => {
                "Microphone access is unavailable. You can type your response instead."
            }
            Notice::NoSpeechDetected => "No speech detected. Try speaking again.",
            Notice::TranscriptionFailed => "Transcription failed, please try again.",
        }
    }
}
