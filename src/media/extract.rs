//! Audio extraction and normalization.
//!
//! Every accepted upload is brought to 16 kHz mono 16-bit PCM WAV before it
//! reaches the transcription engine. Anything that is not already in that
//! shape goes through an ffmpeg subprocess.

use std::io::Cursor;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::{MediaError, MediaKind};

/// Sample rate the engine expects.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Produce normalized WAV bytes for `input`.
///
/// A WAV that is already 16 kHz mono 16-bit passes through untouched; all
/// other inputs (other WAV shapes, compressed audio, video containers) are
/// decoded by ffmpeg with a bounded run time.
pub async fn to_pcm_wav(
    input: &Path,
    kind: MediaKind,
    limit: Duration,
) -> Result<Vec<u8>, MediaError> {
    if kind == MediaKind::Wav {
        let bytes = tokio::fs::read(input).await.map_err(|e| MediaError::Io {
            path: input.to_path_buf(),
            source: e,
        })?;
        if is_normalized_wav(&bytes) {
            debug!("WAV input already 16kHz mono, skipping ffmpeg");
            return Ok(bytes);
        }
    }

    run_ffmpeg(input, limit).await
}

fn is_normalized_wav(bytes: &[u8]) -> bool {
    match hound::WavReader::new(Cursor::new(bytes)) {
        Ok(reader) => {
            let spec = reader.spec();
            spec.channels == 1
                && spec.sample_rate == TARGET_SAMPLE_RATE
                && spec.bits_per_sample == 16
                && spec.sample_format == hound::SampleFormat::Int
        }
        Err(_) => false,
    }
}

async fn run_ffmpeg(input: &Path, limit: Duration) -> Result<Vec<u8>, MediaError> {
    let output_path = input.with_extension("norm.wav");

    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input)
        .args(["-vn", "-ac", "1", "-ar"])
        .arg(TARGET_SAMPLE_RATE.to_string())
        .args(["-sample_fmt", "s16", "-f", "wav"])
        .arg(&output_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    info!("Extracting audio from {:?}", input);

    let child = cmd
        .spawn()
        .map_err(|e| MediaError::Extraction(format!("failed to spawn ffmpeg: {e}")))?;

    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(result) => {
            result.map_err(|e| MediaError::Extraction(format!("ffmpeg did not run: {e}")))?
        }
        Err(_) => return Err(MediaError::ExtractionTimeout(limit.as_secs())),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Extraction(stderr.trim().to_string()));
    }

    let wav = tokio::fs::read(&output_path)
        .await
        .map_err(|e| MediaError::Io {
            path: output_path.clone(),
            source: e,
        })?;
    let _ = tokio::fs::remove_file(&output_path).await;

    Ok(wav)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_wav(sample_rate: u32, channels: u16, samples: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..samples {
                writer.write_sample((i % 128) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn normalized_wav_is_recognized() {
        assert!(is_normalized_wav(&make_wav(TARGET_SAMPLE_RATE, 1, 1600)));
    }

    #[test]
    fn stereo_or_offrate_wav_needs_conversion() {
        assert!(!is_normalized_wav(&make_wav(TARGET_SAMPLE_RATE, 2, 1600)));
        assert!(!is_normalized_wav(&make_wav(44_100, 1, 1600)));
        assert!(!is_normalized_wav(b"not wav at all"));
    }

    #[tokio::test]
    async fn normalized_wav_passes_through_without_ffmpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.wav");
        let wav = make_wav(TARGET_SAMPLE_RATE, 1, 3200);
        tokio::fs::write(&path, &wav).await.unwrap();

        let out = to_pcm_wav(&path, MediaKind::Wav, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, wav);
    }
}
