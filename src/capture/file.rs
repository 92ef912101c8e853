use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::{AudioChunk, CaptureBackend, CaptureConfig};

/// Replays a WAV file as timed chunks.
///
/// Used by the demo binary and integration tests so the full pipeline can
/// run without a microphone. The channel closes when the file is exhausted,
/// which the session observes as the capture ending on its own.
pub struct FileCapture {
    path: PathBuf,
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
    chunk_duration_ms: u64,
    capturing: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl FileCapture {
    pub fn open(path: impl AsRef<Path>, config: CaptureConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let reader = WavReader::open(&path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_secs =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);
        info!(
            "Audio file loaded: {} ({:.1}s, {} Hz, {} channels)",
            path.display(),
            duration_secs,
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            path,
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            chunk_duration_ms: config.chunk_duration_ms,
            capturing: Arc::new(AtomicBool::new(false)),
            feeder: None,
        })
    }

    /// Total duration of the loaded file in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        let (tx, rx) = mpsc::channel(100);

        let samples_per_chunk =
            (self.sample_rate as u64 * self.channels as u64 * self.chunk_duration_ms / 1000)
                .max(1) as usize;
        let samples = self.samples.clone();
        let sample_rate = self.sample_rate;
        let channels = self.channels;
        let chunk_duration_ms = self.chunk_duration_ms;
        let capturing = Arc::clone(&self.capturing);

        capturing.store(true, Ordering::SeqCst);

        let feeder = tokio::spawn(async move {
            let mut timestamp_ms = 0u64;

            for window in samples.chunks(samples_per_chunk) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let chunk = AudioChunk {
                    samples: window.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms,
                };
                timestamp_ms += chunk_duration_ms;

                if tx.send(chunk).await.is_err() {
                    break;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            // tx drops here; the consumer sees the capture end
        });

        self.feeder = Some(feeder);
        info!("File capture started: {}", self.path.display());

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            // The feeder may be parked on a full channel; abort drops its
            // sender and closes the channel
            feeder.abort();
            let _ = feeder.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "file"
    }
}
