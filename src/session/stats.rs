use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Phase;
use crate::capture::PermissionState;

/// A snapshot of a voice session for the embedding UI
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Current phase of the recording machine
    pub phase: Phase,

    /// When the session object was created
    pub started_at: DateTime<Utc>,

    /// Seconds since the session was created
    pub duration_secs: f64,

    /// Chunks accumulated in the current recording
    pub chunk_count: usize,

    /// Most recent normalized amplitude reading
    pub audio_level: f32,

    /// Microphone permission as observed this session
    pub mic_permission: PermissionState,

    /// Whether submit is currently enabled
    pub can_submit: bool,
}
