use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// One chunk of captured audio (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioChunk {
    /// Duration of this chunk in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (backends fall back to the device rate if unsupported)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Chunk size in milliseconds (affects how much audio is lost on abrupt stop)
    pub chunk_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // what the transcription service expects
            target_channels: 1,
            chunk_duration_ms: 100,
        }
    }
}

/// Where the audio comes from
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Live microphone input
    Microphone,
    /// Replay a WAV file as timed chunks
    File(PathBuf),
    /// Replay a pre-built chunk sequence (tests, demos)
    Scripted(super::ScriptedFeed),
}

/// Audio capture backend
///
/// Implementations deliver chunks over a bounded channel while capturing.
/// Dropping the sender is the flush barrier: every chunk handed to the
/// channel before `stop()` completes is still received by the consumer
/// before the channel reports closed.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing; returns the chunk receiver
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>>;

    /// Stop capturing and release the underlying device
    async fn stop(&mut self) -> Result<()>;

    /// Whether the backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Creates capture backends from a source description
///
/// Construction is also the permission probe: failing to open the
/// microphone here is what the session reports as a denied permission.
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Microphone => {
                let backend = super::MicrophoneCapture::new(config)?;
                Ok(Box::new(backend))
            }
            CaptureSource::File(path) => {
                let backend = super::FileCapture::open(path, config)?;
                Ok(Box::new(backend))
            }
            CaptureSource::Scripted(feed) => Ok(Box::new(super::ScriptedCapture::new(feed))),
        }
    }
}
