use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use mirror_voice::session::run_to_completion;
use mirror_voice::{
    CaptureConfig, CaptureSource, Config, HttpTranscriber, SessionOptions, SubmitHandler,
    VoiceSession,
};

/// Runs the voice pipeline end to end: capture, silence auto-stop,
/// transcription, submit.
#[derive(Debug, Parser)]
#[command(name = "mirror-voice", about = "Voice capture and transcription demo")]
struct Args {
    /// WAV file to replay through the pipeline (records from the
    /// microphone if omitted)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Transcription endpoint
    #[arg(long, default_value = "http://localhost:3000/api/transcribe")]
    endpoint: String,

    /// Config file overriding endpoint and tuning
    #[arg(long)]
    config: Option<String>,

    /// Quiet period before the recording auto-stops, in milliseconds
    #[arg(long, default_value_t = 3500)]
    silence_threshold_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match &args.config {
        Some(path) => {
            let cfg = Config::load(path)?;
            info!("Loaded config: {}", cfg.service.name);
            let timeout = Duration::from_secs(cfg.transcription.timeout_secs);
            let transcriber = HttpTranscriber::with_timeout(&cfg.transcription.endpoint, timeout)?;
            run(args, cfg.capture_config(), cfg.session_options(), transcriber).await
        }
        None => {
            let options = SessionOptions {
                silence_threshold: Duration::from_millis(args.silence_threshold_ms),
                ..SessionOptions::default()
            };
            let transcriber = HttpTranscriber::new(&args.endpoint)?;
            run(args, CaptureConfig::default(), options, transcriber).await
        }
    }
}

async fn run(
    args: Args,
    capture_config: CaptureConfig,
    options: SessionOptions,
    transcriber: HttpTranscriber,
) -> Result<()> {
    let source = match &args.input {
        Some(path) => CaptureSource::File(path.clone()),
        None => CaptureSource::Microphone,
    };

    let (submitted_tx, mut submitted_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let on_submit: SubmitHandler = Arc::new(move |text| {
        let _ = submitted_tx.send(text);
    });

    let session_id = options.session_id.clone();
    let (session, mut notice_rx) =
        VoiceSession::with_capture_config(source, options, capture_config, Arc::new(transcriber), on_submit);

    info!("Voice session {} starting", session_id);

    let notices = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            println!("! {}", notice.user_message());
        }
    });

    run_to_completion(&session).await?;

    if let Ok(text) = submitted_rx.try_recv() {
        println!("{text}");
    }

    session.shutdown().await;
    notices.abort();

    Ok(())
}
