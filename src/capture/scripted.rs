use anyhow::Result;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{AudioChunk, CaptureBackend, CaptureConfig};

/// A pre-built chunk sequence for replay, with start/stop spies.
///
/// The counters let tests assert the resource-release contract: every exit
/// path must stop the backend exactly once.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFeed {
    chunks: Vec<AudioChunk>,
    hold_open: bool,
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl ScriptedFeed {
    pub fn new(chunks: Vec<AudioChunk>) -> Self {
        Self {
            chunks,
            hold_open: false,
            started: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Keep the channel open after the script runs out, until `stop()` is
    /// called. Without this the capture ends on its own like a finished file.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// How many times a backend built from this feed was started
    pub fn start_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// How many times `stop()` was invoked on a backend built from this feed
    pub fn stop_count(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    /// A uniform chunk at the given amplitude, 100ms of 16kHz mono
    pub fn uniform_chunk(amplitude: i16, timestamp_ms: u64) -> AudioChunk {
        AudioChunk {
            samples: vec![amplitude; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms,
        }
    }
}

/// Capture backend that replays a `ScriptedFeed`
pub struct ScriptedCapture {
    feed: ScriptedFeed,
    capturing: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl ScriptedCapture {
    pub fn new(feed: ScriptedFeed) -> Self {
        Self {
            feed,
            capturing: Arc::new(AtomicBool::new(false)),
            feeder: None,
        }
    }

    // Config is accepted for factory symmetry; the script fixes its own
    // chunk sizes and timestamps.
    pub fn with_config(feed: ScriptedFeed, _config: CaptureConfig) -> Self {
        Self::new(feed)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        self.feed.started.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(100);
        let chunks = self.feed.chunks.clone();
        let hold_open = self.feed.hold_open;
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        let feeder = tokio::spawn(async move {
            for chunk in chunks {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }
                if tx.send(chunk).await.is_err() {
                    break;
                }
                // Yield so the consumer can react between chunks (e.g. a
                // silence stop mid-script)
                tokio::task::yield_now().await;
            }

            while hold_open && capturing.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }

            capturing.store(false, Ordering::SeqCst);
        });

        self.feeder = Some(feeder);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.feed.stopped.fetch_add(1, Ordering::SeqCst);
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
            let _ = feeder.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
