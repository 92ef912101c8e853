use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::{AudioChunk, CaptureBackend, CaptureConfig};

/// Sample formats we can consume, most preferred first
const FORMAT_PREFERENCE: [SampleFormat; 3] =
    [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Live microphone capture via cpal.
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread
/// that drains the callback buffer into chunks every `chunk_duration_ms`.
/// Constructing this backend opens the input device; a construction failure
/// is what the session layer reports as a denied microphone permission.
pub struct MicrophoneCapture {
    config: CaptureConfig,
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    device_name: String,
    stop_flag: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneCapture {
    pub fn new(config: CaptureConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("No microphone input device available")?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        // Preferred format at the target rate, or the device default if the
        // preference list yields nothing.
        let supported = match Self::preferred_config(&device, &config) {
            Ok(supported) => supported,
            Err(err) => {
                warn!(
                    "No preferred input config on '{}' ({err}); using device default",
                    device_name
                );
                device
                    .default_input_config()
                    .context("Failed to open default input config")?
            }
        };

        let sample_format = supported.sample_format();
        let stream_config = supported.config();

        info!(
            "Microphone ready: '{}' {} Hz, {} channels, {:?}",
            device_name, stream_config.sample_rate.0, stream_config.channels, sample_format
        );

        Ok(Self {
            config,
            stream_config,
            sample_format,
            device_name,
            stop_flag: Arc::new(AtomicBool::new(false)),
            worker: None,
            capturing: false,
        })
    }

    fn preferred_config(
        device: &Device,
        config: &CaptureConfig,
    ) -> Result<SupportedStreamConfig> {
        let ranges: Vec<_> = device
            .supported_input_configs()
            .context("Failed to query supported input configs")?
            .collect();

        for format in FORMAT_PREFERENCE {
            let found = ranges.iter().find(|range| {
                range.sample_format() == format
                    && range.min_sample_rate().0 <= config.target_sample_rate
                    && range.max_sample_rate().0 >= config.target_sample_rate
            });

            if let Some(range) = found {
                return Ok(range
                    .clone()
                    .with_sample_rate(SampleRate(config.target_sample_rate)));
            }
        }

        bail!(
            "no input config supports {} Hz in {:?}",
            config.target_sample_rate,
            FORMAT_PREFERENCE
        )
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>> {
        if self.capturing {
            bail!("microphone capture already started");
        }

        let (tx, rx) = mpsc::channel(100);

        self.stop_flag.store(false, Ordering::SeqCst);
        let stop_flag = Arc::clone(&self.stop_flag);
        let stream_config = self.stream_config.clone();
        let sample_format = self.sample_format;
        let chunk_ms = self.config.chunk_duration_ms;

        let worker = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                if let Err(err) = run_capture(stream_config, sample_format, chunk_ms, tx, stop_flag)
                {
                    error!("Microphone capture thread failed: {err:#}");
                }
            })
            .context("Failed to spawn capture thread")?;

        self.worker = Some(worker);
        self.capturing = true;

        info!("Microphone capture started on '{}'", self.device_name);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }
        self.capturing = false;
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            tokio::task::spawn_blocking(move || {
                if worker.join().is_err() {
                    error!("Capture thread panicked");
                }
            })
            .await
            .context("Failed to join capture thread")?;
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneCapture {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Runs on the capture thread: owns the cpal stream, drains the callback
/// buffer into chunks, and flushes the remainder before the sender drops.
fn run_capture(
    stream_config: StreamConfig,
    sample_format: SampleFormat,
    chunk_ms: u64,
    tx: mpsc::Sender<AudioChunk>,
    stop_flag: Arc<AtomicBool>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("Microphone disappeared before capture started")?;

    let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
    let channels = stream_config.channels as usize;
    let err_fn = |err: cpal::StreamError| error!("Audio stream error: {err}");

    let stream = match sample_format {
        SampleFormat::F32 => {
            let buffer = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                        .collect();
                    push_mono(&buffer, &converted, channels);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::I16 => {
            let buffer = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    push_mono(&buffer, data, channels);
                },
                err_fn,
                None,
            )?
        }
        SampleFormat::U16 => {
            let buffer = Arc::clone(&buffer);
            device.build_input_stream(
                &stream_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    let converted: Vec<i16> =
                        data.iter().map(|&s| (s as i32 - 32768) as i16).collect();
                    push_mono(&buffer, &converted, channels);
                },
                err_fn,
                None,
            )?
        }
        other => bail!("Unsupported sample format: {other:?}"),
    };

    stream.play().context("Failed to start input stream")?;

    let started = Instant::now();
    let sample_rate = stream_config.sample_rate.0;
    let interval = Duration::from_millis(chunk_ms.max(10));

    while !stop_flag.load(Ordering::SeqCst) {
        std::thread::sleep(interval);

        let samples = {
            let mut buf = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            std::mem::take(&mut *buf)
        };
        if samples.is_empty() {
            continue;
        }

        let chunk = AudioChunk {
            samples,
            sample_rate,
            channels: 1,
            timestamp_ms: started.elapsed().as_millis() as u64,
        };

        match tx.try_send(chunk) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => break,
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Consumer stalled; drop the chunk rather than park the
                // device thread on a full channel
                warn!("Chunk channel full, dropping {chunk_ms}ms of audio");
            }
        }
    }

    // Release the device before the final flush so the recording indicator
    // clears as soon as stop is requested.
    drop(stream);

    let remainder = {
        let mut buf = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *buf)
    };
    if !remainder.is_empty() {
        let _ = tx.try_send(AudioChunk {
            samples: remainder,
            sample_rate,
            channels: 1,
            timestamp_ms: started.elapsed().as_millis() as u64,
        });
    }

    Ok(())
}

/// Downmix interleaved samples to mono and append to the shared buffer
fn push_mono(buffer: &Mutex<Vec<i16>>, samples: &[i16], channels: usize) {
    let Ok(mut buf) = buffer.lock() else {
        // Poisoned by a panicking callback; drop this batch
        return;
    };

    if channels <= 1 {
        buf.extend_from_slice(samples);
        return;
    }

    for frame in samples.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        buf.push((sum / channels as i32) as i16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_mono_averages_stereo_frames() {
        let buffer = Mutex::new(Vec::new());
        push_mono(&buffer, &[100, 200, -50, 50], 2);
        assert_eq!(*buffer.lock().unwrap(), vec![150, 0]);
    }

    #[test]
    fn push_mono_passes_mono_through() {
        let buffer = Mutex::new(Vec::new());
        push_mono(&buffer, &[1, 2, 3], 1);
        assert_eq!(*buffer.lock().unwrap(), vec![1, 2, 3]);
    }
}
