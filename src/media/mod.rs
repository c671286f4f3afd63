//! Media container validation.
//!
//! The client's file-extension allow-list is advisory only; uploads are
//! re-checked here against the actual container magic bytes before a job is
//! accepted.

pub mod chunk;
pub mod extract;

use std::path::PathBuf;
use thiserror::Error;

pub use chunk::{WavChunk, split_wav};
pub use extract::{TARGET_SAMPLE_RATE, to_pcm_wav};

/// Video containers accepted for upload.
pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];
/// Audio containers accepted for upload.
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Unsupported file format. Supported formats: {0}")]
    Unsupported(String),
    #[error("File too large. Maximum size is {limit} bytes, got {size}")]
    TooLarge { size: u64, limit: u64 },
    #[error("Error extracting audio: {0}")]
    Extraction(String),
    #[error("Audio extraction timed out after {0}s")]
    ExtractionTimeout(u64),
    #[error("Malformed WAV data: {0}")]
    Wav(String),
    #[error("media io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Accepted media kinds, derived from extension plus magic-byte sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Wav,
    Mp3,
    M4a,
    Mp4,
    Mov,
    Avi,
    Mkv,
}

impl MediaKind {
    pub fn is_video(&self) -> bool {
        matches!(
            self,
            MediaKind::Mp4 | MediaKind::Mov | MediaKind::Avi | MediaKind::Mkv
        )
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Wav => "wav",
            MediaKind::Mp3 => "mp3",
            MediaKind::M4a => "m4a",
            MediaKind::Mp4 => "mp4",
            MediaKind::Mov => "mov",
            MediaKind::Avi => "avi",
            MediaKind::Mkv => "mkv",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "wav" => Some(MediaKind::Wav),
            "mp3" => Some(MediaKind::Mp3),
            "m4a" => Some(MediaKind::M4a),
            "mp4" => Some(MediaKind::Mp4),
            "mov" => Some(MediaKind::Mov),
            "avi" => Some(MediaKind::Avi),
            "mkv" => Some(MediaKind::Mkv),
            _ => None,
        }
    }
}

/// Container families distinguishable from the first bytes of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    RiffWave,
    RiffAvi,
    Iso4,
    Mp3,
    Ebml,
}

fn sniff_container(bytes: &[u8]) -> Option<Container> {
    if bytes.len() < 12 {
        return None;
    }
    if &bytes[0..4] == b"RIFF" {
        return match &bytes[8..12] {
            b"WAVE" => Some(Container::RiffWave),
            b"AVI " => Some(Container::RiffAvi),
            _ => None,
        };
    }
    if &bytes[4..8] == b"ftyp" {
        return Some(Container::Iso4);
    }
    if &bytes[0..3] == b"ID3" || (bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
        return Some(Container::Mp3);
    }
    if &bytes[0..4] == [0x1A, 0x45, 0xDF, 0xA3] {
        return Some(Container::Ebml);
    }
    None
}

fn expected_container(kind: MediaKind) -> Container {
    match kind {
        MediaKind::Wav => Container::RiffWave,
        MediaKind::Avi => Container::RiffAvi,
        MediaKind::Mp3 => Container::Mp3,
        MediaKind::Mkv => Container::Ebml,
        MediaKind::M4a | MediaKind::Mp4 | MediaKind::Mov => Container::Iso4,
    }
}

fn supported_list() -> String {
    SUPPORTED_VIDEO_EXTENSIONS
        .iter()
        .chain(SUPPORTED_AUDIO_EXTENSIONS.iter())
        .map(|e| format!(".{e}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validate an upload: the extension must be on the allow-list and the leading
/// bytes must carry the matching container signature.
pub fn detect(filename: &str, bytes: &[u8]) -> Result<MediaKind, MediaError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();

    let kind =
        MediaKind::from_extension(&ext).ok_or_else(|| MediaError::Unsupported(supported_list()))?;

    match sniff_container(bytes) {
        Some(container) if container == expected_container(kind) => Ok(kind),
        _ => Err(MediaError::Unsupported(supported_list())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_header() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(b"RIFF");
        b.extend_from_slice(&36u32.to_le_bytes());
        b.extend_from_slice(b"WAVE");
        b.extend_from_slice(b"fmt ");
        b
    }

    #[test]
    fn detects_wav_by_signature() {
        let kind = detect("talk.wav", &wav_header()).unwrap();
        assert_eq!(kind, MediaKind::Wav);
        assert!(!kind.is_video());
    }

    #[test]
    fn detects_mp4_by_ftyp_box() {
        let mut b = vec![0, 0, 0, 0x20];
        b.extend_from_slice(b"ftypisom");
        b.extend_from_slice(&[0; 8]);
        let kind = detect("clip.mp4", &b).unwrap();
        assert_eq!(kind, MediaKind::Mp4);
        assert!(kind.is_video());
    }

    #[test]
    fn rejects_extension_not_on_allow_list() {
        let err = detect("notes.txt", b"plain text, long enough to sniff").unwrap_err();
        assert!(matches!(err, MediaError::Unsupported(_)));
    }

    #[test]
    fn rejects_renamed_file_with_wrong_signature() {
        // A text file renamed to .wav must not pass server-side validation.
        let err = detect("sneaky.wav", b"this is not riff data at all").unwrap_err();
        assert!(matches!(err, MediaError::Unsupported(_)));
    }

    #[test]
    fn rejects_truncated_bytes() {
        assert!(detect("tiny.wav", b"RIFF").is_err());
    }

    #[test]
    fn detects_mkv_by_ebml_header() {
        let mut b = vec![0x1A, 0x45, 0xDF, 0xA3];
        b.extend_from_slice(&[0x42, 0x86, 0x81, 0x01, 0x42, 0xF7, 0x81, 0x01]);
        assert_eq!(detect("rec.mkv", &b).unwrap(), MediaKind::Mkv);
    }
}
