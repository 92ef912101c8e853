use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller-supplied options for a voice input session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Unique session identifier (e.g. "voice-<uuid>")
    pub session_id: String,

    /// Start recording without an explicit user action
    pub auto_start: bool,

    /// How long to wait before an auto-start fires
    pub auto_start_delay: Duration,

    /// Pause between a retry and the next recording
    pub retry_delay: Duration,

    /// Quiet period after which a recording auto-stops.
    /// Tuned for perceived responsiveness, not correctness.
    pub silence_threshold: Duration,

    /// Normalized amplitude below which audio counts as silence
    pub noise_floor: f32,

    /// Prompt shown in the typed fallback
    pub placeholder: String,

    /// Optional prompt the caller wants read to the user before recording
    pub prompt_text: Option<String>,

    /// Label for the submit action
    pub submit_label: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            session_id: format!("voice-{}", uuid::Uuid::new_v4()),
            auto_start: false,
            auto_start_delay: Duration::from_millis(500),
            retry_delay: Duration::from_millis(300),
            silence_threshold: Duration::from_millis(3500),
            noise_floor: 0.05,
            placeholder: "Type your response...".to_string(),
            prompt_text: None,
            submit_label: "Submit".to_string(),
        }
    }
}
