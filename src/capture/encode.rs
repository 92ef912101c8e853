use anyhow::{bail, Context, Result};
use std::io::Cursor;

use super::AudioChunk;

/// Assemble accumulated chunks into a single in-memory WAV buffer.
///
/// The WAV header takes its format from the first chunk; all chunks in one
/// recording share a format because they come from one backend start.
pub fn encode_wav(chunks: &[AudioChunk]) -> Result<Vec<u8>> {
    let first = match chunks.first() {
        Some(chunk) => chunk,
        None => bail!("no audio captured"),
    };

    let spec = hound::WavSpec {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;

        for chunk in chunks {
            for &sample in &chunk.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV buffer")?;
            }
        }

        writer.finalize().context("Failed to finalize WAV buffer")?;
    }

    Ok(cursor.into_inner())
}
