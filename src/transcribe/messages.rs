use serde::{Deserialize, Serialize};

/// Request body for the transcription endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded WAV audio, no data-URL prefix
    #[serde(rename = "audioBase64")]
    pub audio_base64: String,
}

/// Response body from the transcription endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    /// Transcribed text; empty string means no speech was heard
    #[serde(default)]
    pub text: String,
}
