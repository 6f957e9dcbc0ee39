//! Intake of externally provided files.
//!
//! Files arrive either as paths typed into the upload prompt, as CLI
//! arguments, or as a drop onto the terminal window (which terminals deliver
//! as a bracketed paste of the file paths). Every file carries a declared
//! media type derived from its extension; only `audio/*` entries become
//! attachments and everything else is dropped without complaint.

use std::path::{Path, PathBuf};

use super::list::{Attachment, Origin};

/// A file handed to the widget, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub media_type: String,
    pub payload: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            payload,
        }
    }
}

/// Whether a declared media type is in the audio category.
pub fn is_audio(media_type: &str) -> bool {
    media_type
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("audio/"))
}

/// Keeps the audio files of a batch, in the order received.
pub fn accept(batch: Vec<IncomingFile>) -> Vec<Attachment> {
    batch
        .into_iter()
        .filter_map(|file| {
            if is_audio(&file.media_type) {
                Some(Attachment::new(
                    file.name,
                    file.payload,
                    file.media_type,
                    Origin::Uploaded,
                ))
            } else {
                tracing::debug!("Ignoring non-audio file {} ({})", file.name, file.media_type);
                None
            }
        })
        .collect()
}

/// Declared media type for a file, from its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Reads files from disk into a batch. Unreadable paths are skipped.
pub fn load_paths(paths: &[PathBuf]) -> Vec<IncomingFile> {
    paths
        .iter()
        .filter_map(|path| {
            if path.is_dir() {
                tracing::warn!("Skipping directory {}", path.display());
                return None;
            }
            match std::fs::read(path) {
                Ok(payload) => {
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    Some(IncomingFile::new(name, media_type_for_path(path), payload))
                }
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect()
}

/// Splits a terminal drop or paste payload into file paths.
///
/// Paths are separated by whitespace. Single and double quotes group a path
/// containing spaces, a backslash escapes the next character outside single
/// quotes, and `file://` URIs are percent-decoded.
pub fn parse_dropped_paths(text: &str) -> Vec<PathBuf> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_token = true;
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }

    tokens
        .into_iter()
        .filter(|token| !token.is_empty())
        .map(|token| PathBuf::from(decode_file_uri(&token)))
        .collect()
}

fn decode_file_uri(token: &str) -> String {
    let Some(rest) = token.strip_prefix("file://") else {
        return token.to_string();
    };
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    match urlencoding::decode(rest) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::debug!("Could not decode dropped URI {}: {}", token, e);
            rest.to_string()
        }
    }
}
