use anyhow::{Context, Result};
use base64::Engine;
use std::time::Duration;
use tracing::info;

use super::messages::{TranscribeRequest, TranscribeResponse};

/// Converts recorded audio into text.
///
/// A trait so the session can be driven against a scripted transcriber in
/// tests. Implementations return `Ok` with whatever text the service heard
/// (possibly empty) and `Err` only for transport or service failures.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_wav: Vec<u8>) -> Result<String>;
}

/// Submits audio to the transcription endpoint over HTTP
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    /// The observed service has no explicit timeout; one is imposed here so
    /// a hung request eventually surfaces as a transcription failure.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_wav: Vec<u8>) -> Result<String> {
        let audio_base64 = base64::engine::general_purpose::STANDARD.encode(&audio_wav);

        info!(
            "Submitting {} bytes of audio to {}",
            audio_wav.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&TranscribeRequest { audio_base64 })
            .send()
            .await
            .context("Transcription request failed")?
            .error_for_status()
            .context("Transcription service returned an error status")?;

        let body: TranscribeResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        info!("Transcription returned {} chars", body.text.len());

        Ok(body.text)
    }
}
