//! Fixed-duration windowing of normalized WAV audio.
//!
//! The engine caps request size, so long recordings are split into windows
//! with a small overlap at the seams. Boundary words may repeat or clip
//! there; that is accepted rather than corrected.

use std::io::Cursor;

use super::MediaError;

/// One transcription window, re-encoded as a standalone WAV.
#[derive(Debug, Clone)]
pub struct WavChunk {
    pub index: usize,
    /// Offset of the window start in the source audio.
    pub start_secs: f64,
    pub bytes: Vec<u8>,
}

/// Split normalized WAV bytes into windows of `chunk_secs` with
/// `overlap_secs` carried over between consecutive windows.
pub fn split_wav(
    wav: &[u8],
    chunk_secs: u64,
    overlap_secs: u64,
) -> Result<Vec<WavChunk>, MediaError> {
    if chunk_secs == 0 || overlap_secs >= chunk_secs {
        return Err(MediaError::Wav(format!(
            "invalid window: {chunk_secs}s with {overlap_secs}s overlap"
        )));
    }

    let mut reader =
        hound::WavReader::new(Cursor::new(wav)).map_err(|e| MediaError::Wav(e.to_string()))?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.bits_per_sample != 16 {
        return Err(MediaError::Wav(format!(
            "expected mono 16-bit PCM, got {} channel(s) at {} bits",
            spec.channels, spec.bits_per_sample
        )));
    }

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|e| MediaError::Wav(e.to_string()))?;
    if samples.is_empty() {
        return Err(MediaError::Wav("no audio samples".to_string()));
    }

    let rate = spec.sample_rate as usize;
    let window = chunk_secs as usize * rate;
    let step = window - overlap_secs as usize * rate;

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + window).min(samples.len());
        chunks.push(WavChunk {
            index: chunks.len(),
            start_secs: start as f64 / rate as f64,
            bytes: encode_wav(&samples[start..end], spec.sample_rate)?,
        });
        if end == samples.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, MediaError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| MediaError::Wav(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| MediaError::Wav(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| MediaError::Wav(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
