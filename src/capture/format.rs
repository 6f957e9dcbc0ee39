//! Encoding formats a recording can be finalized into.
//!
//! Formats are tried in preference order and the first one the capture host
//! reports as supported wins. The default order puts compressed formats first
//! and falls back to uncompressed WAV, which every host can produce.

use serde::{Deserialize, Serialize};

/// An audio encoding a finished recording can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// Opus in a WebM container
    Webm,
    /// Opus in an Ogg container
    Ogg,
    /// AAC in an MP4 container
    M4a,
    /// MPEG layer 3
    Mp3,
    /// Uncompressed 16-bit PCM WAV
    Wav,
}

impl EncodingFormat {
    /// Default preference order, most preferred first.
    pub const DEFAULT_PREFERENCE: [EncodingFormat; 5] = [
        EncodingFormat::Webm,
        EncodingFormat::Ogg,
        EncodingFormat::M4a,
        EncodingFormat::Mp3,
        EncodingFormat::Wav,
    ];

    /// Full MIME type including codec parameters.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm;codecs=opus",
            Self::Ogg => "audio/ogg;codecs=opus",
            Self::M4a => "audio/mp4",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
        }
    }

    /// MIME type without parameters, as stored on attachments.
    pub fn media_type(&self) -> &'static str {
        self.mime().split(';').next().unwrap_or_default()
    }

    /// File extension for clips in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::M4a => "m4a",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }

    /// ffmpeg encoder needed for this format. WAV is written directly.
    pub fn ffmpeg_encoder(&self) -> Option<&'static str> {
        match self {
            Self::Webm | Self::Ogg => Some("libopus"),
            Self::M4a => Some("aac"),
            Self::Mp3 => Some("libmp3lame"),
            Self::Wav => None,
        }
    }

    /// ffmpeg muxer name for this format.
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            Self::Webm => "webm",
            Self::Ogg => "ogg",
            Self::M4a => "ipod",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

impl std::fmt::Display for EncodingFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mime())
    }
}

/// Picks the first format in `preference` accepted by `supported`.
pub fn negotiate<F>(preference: &[EncodingFormat], supported: F) -> Option<EncodingFormat>
where
    F: Fn(EncodingFormat) -> bool,
{
    preference.iter().copied().find(|format| supported(*format))
}
