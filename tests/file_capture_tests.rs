// Integration tests for the WAV replay backend
//
// FileCapture stands in for the microphone in the demo binary and lets the
// pipeline run over fixture audio; the capture ends on its own when the
// file is exhausted.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use mirror_voice::{
    CaptureBackend, CaptureConfig, CaptureSource, FileCapture, Phase, SessionOptions,
    SubmitHandler, Transcriber, VoiceSession,
};

/// Write a mono 16kHz WAV of the given amplitude and duration
fn write_fixture(dir: &TempDir, name: &str, amplitude: i16, duration_ms: u64) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)?;
    let sample_count = 16000 * duration_ms / 1000;
    for _ in 0..sample_count {
        writer.write_sample(amplitude)?;
    }
    writer.finalize()?;

    Ok(path)
}

#[tokio::test]
async fn replays_a_file_as_timed_chunks() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(&dir, "one-second.wav", 1000, 1000)?;

    let mut capture = FileCapture::open(&path, CaptureConfig::default())?;
    assert_eq!(capture.duration_ms(), 1000);

    let mut chunk_rx = capture.start().await?;

    let mut chunks = Vec::new();
    while let Some(chunk) = chunk_rx.recv().await {
        chunks.push(chunk);
    }

    // 1s of audio in 100ms chunks
    assert_eq!(chunks.len(), 10);
    assert_eq!(chunks[0].timestamp_ms, 0);
    assert_eq!(chunks[9].timestamp_ms, 900);
    assert!(chunks.iter().all(|c| c.sample_rate == 16000));

    let total: usize = chunks.iter().map(|c| c.samples.len()).sum();
    assert_eq!(total, 16000);

    capture.stop().await?;
    Ok(())
}

#[tokio::test]
async fn open_fails_for_a_missing_file() {
    let result = FileCapture::open("/nonexistent/take.wav", CaptureConfig::default());
    assert!(result.is_err());
}

#[tokio::test]
async fn stop_mid_replay_ends_the_feed() -> Result<()> {
    let dir = TempDir::new()?;
    let path = write_fixture(&dir, "long.wav", 1000, 5000)?;

    let mut capture = FileCapture::open(&path, CaptureConfig::default())?;
    let mut chunk_rx = capture.start().await?;

    // Take a little, then stop
    let first = chunk_rx.recv().await;
    assert!(first.is_some());
    capture.stop().await?;

    // The channel drains whatever was in flight, then closes
    while chunk_rx.recv().await.is_some() {}
    assert!(!capture.is_capturing());
    Ok(())
}

struct CountingTranscriber {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Transcriber for CountingTranscriber {
    async fn transcribe(&self, audio_wav: Vec<u8>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(&audio_wav[0..4], b"RIFF");
        Ok("I hear you".to_string())
    }
}

#[tokio::test]
async fn full_pipeline_over_a_file_source() -> Result<()> {
    let dir = TempDir::new()?;
    // Loud enough to never trip the silence stop; the file just ends
    let path = write_fixture(&dir, "speech.wav", 8000, 800)?;

    let transcriber = Arc::new(CountingTranscriber {
        calls: AtomicUsize::new(0),
    });
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&delivered);
    let handler: SubmitHandler = Arc::new(move |text| {
        sink.lock().unwrap().push(text);
    });

    let (session, _notice_rx) = VoiceSession::new(
        CaptureSource::File(path),
        SessionOptions::default(),
        transcriber.clone(),
        handler,
    );

    session.start().await;

    tokio::time::timeout(Duration::from_secs(2), async {
        while session.phase().await != Phase::Ready {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("pipeline never reached Ready");

    assert_eq!(session.transcribed_text().await, "I hear you");
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 1);

    session.submit().await;
    assert_eq!(*delivered.lock().unwrap(), vec!["I hear you".to_string()]);

    session.shutdown().await;
    Ok(())
}
