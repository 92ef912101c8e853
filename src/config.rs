use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::capture::CaptureConfig;
use crate::session::SessionOptions;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub transcription: TranscriptionConfig,
    pub capture: CaptureSettings,
    pub voice: VoiceTuning,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionConfig {
    /// Transcription endpoint, e.g. "http://localhost:3000/api/transcribe"
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct VoiceTuning {
    /// Normalized amplitude below which audio counts as silence
    pub noise_floor: f32,
    /// Quiet period before a recording auto-stops, in milliseconds
    pub silence_threshold_ms: u64,
    pub auto_start: bool,
    pub auto_start_delay_ms: u64,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            target_sample_rate: self.capture.sample_rate,
            target_channels: self.capture.channels,
            chunk_duration_ms: self.capture.chunk_duration_ms,
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            auto_start: self.voice.auto_start,
            auto_start_delay: Duration::from_millis(self.voice.auto_start_delay_ms),
            silence_threshold: Duration::from_millis(self.voice.silence_threshold_ms),
            noise_floor: self.voice.noise_floor,
            ..SessionOptions::default()
        }
    }
}
