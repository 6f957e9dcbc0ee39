//! Turns captured PCM samples into a clip payload.
//!
//! WAV is written in memory with hound. Compressed formats go through a
//! temporary WAV file that ffmpeg converts; both temporary files are removed
//! afterwards and only the encoded bytes are kept.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use hound::WavWriter;

use super::format::EncodingFormat;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Encodes mono 16-bit samples captured at `sample_rate`.
///
/// `ffmpeg` must be provided for every format other than WAV.
pub fn encode(
    samples: &[i16],
    sample_rate: u32,
    format: EncodingFormat,
    ffmpeg: Option<&Path>,
) -> Result<Vec<u8>> {
    let wav = encode_wav(samples, sample_rate)?;
    if format == EncodingFormat::Wav {
        return Ok(wav);
    }

    let ffmpeg = ffmpeg.ok_or_else(|| anyhow!("ffmpeg is required to encode {format}"))?;
    convert_with_ffmpeg(ffmpeg, &wav, format)
}

/// Writes samples as a mono 16-bit PCM WAV file in memory.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Converts an in-memory WAV payload to `format` with ffmpeg.
fn convert_with_ffmpeg(ffmpeg: &Path, wav: &[u8], format: EncodingFormat) -> Result<Vec<u8>> {
    let encoder = format
        .ffmpeg_encoder()
        .ok_or_else(|| anyhow!("no ffmpeg encoder for {format}"))?;

    let input = temp_path("wav");
    let output = temp_path(format.extension());
    std::fs::write(&input, wav)
        .with_context(|| format!("Failed to write temporary WAV at {}", input.display()))?;

    let result = Command::new(ffmpeg)
        .arg("-loglevel")
        .arg("error")
        .arg("-i")
        .arg(&input)
        .arg("-acodec")
        .arg(encoder)
        .arg("-ac")
        .arg("1")
        .arg("-f")
        .arg(format.ffmpeg_muxer())
        .arg("-y")
        .arg(&output)
        .output();

    if let Err(e) = std::fs::remove_file(&input) {
        tracing::debug!("Failed to remove temp file: {}", e);
    }

    let result = result.map_err(|e| anyhow!("Failed to run ffmpeg: {e}"))?;
    if !result.status.success() {
        std::fs::remove_file(&output).ok();
        let error_msg = String::from_utf8_lossy(&result.stderr);
        tracing::error!("ffmpeg conversion failed: {}", error_msg);
        return Err(anyhow!("Audio encoding failed: {error_msg}"));
    }

    let encoded = std::fs::read(&output)
        .with_context(|| format!("Failed to read encoded clip at {}", output.display()))?;
    if let Err(e) = std::fs::remove_file(&output) {
        tracing::debug!("Failed to remove temp file: {}", e);
    }

    tracing::debug!(
        "Audio converted to {} ({} -> {} bytes)",
        format,
        wav.len(),
        encoded.len()
    );
    Ok(encoded)
}

fn temp_path(extension: &str) -> PathBuf {
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("vmsg_{}_{n}.{extension}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrips_through_hound() {
        let samples: Vec<i16> = (0..1600).map(|i| (i % 200) as i16 * 100).collect();
        let bytes = encode(&samples, 16000, EncodingFormat::Wav, None).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16000);
        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_compressed_without_ffmpeg_fails() {
        let err = encode(&[0, 1, 2], 16000, EncodingFormat::Webm, None).unwrap_err();
        assert!(err.to_string().contains("ffmpeg"));
    }

    #[test]
    fn test_temp_paths_are_unique() {
        assert_ne!(temp_path("wav"), temp_path("wav"));
    }
}
