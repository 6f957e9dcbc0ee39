//! ffmpeg discovery and encoder probing.
//!
//! Compressed clip formats are produced by piping captured PCM through ffmpeg.
//! The binary is looked up in the usual install locations before falling back
//! to a PATH search, and its encoder list decides which formats the capture
//! host reports as supported.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, Result};

/// Locates the ffmpeg binary on the system.
///
/// Checks platform install locations first (Homebrew, /usr/bin, snap,
/// `C:\ffmpeg`), then searches PATH with `which` or `where`.
pub fn find_ffmpeg() -> Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/snap/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    } else {
        vec![]
    };

    if let Some(path) = candidates.into_iter().find(|path| path.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let ffmpeg_path = find_in_path("ffmpeg")?;
    tracing::debug!("Found ffmpeg in PATH at: {}", ffmpeg_path.display());
    Ok(ffmpeg_path)
}

/// Searches for a binary in the system PATH.
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = stdout.lines().next() {
            let path = PathBuf::from(first.trim());
            if !path.as_os_str().is_empty() {
                return Ok(path);
            }
        }
    }

    Err(anyhow!(
        "ffmpeg not found; recordings will be stored as WAV. Install ffmpeg for compressed formats."
    ))
}

/// Runs `ffmpeg -encoders` and returns the names of the audio encoders.
pub fn probe_audio_encoders(ffmpeg: &Path) -> Result<HashSet<String>> {
    let output = Command::new(ffmpeg)
        .args(["-hide_banner", "-encoders"])
        .output()
        .map_err(|e| anyhow!("Failed to run {}: {e}", ffmpeg.display()))?;

    if !output.status.success() {
        return Err(anyhow!(
            "ffmpeg -encoders failed: {}",
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    Ok(parse_audio_encoders(&String::from_utf8_lossy(&output.stdout)))
}

/// Parses the table printed by `ffmpeg -encoders`.
///
/// Encoder rows start with a six character capability column whose first
/// letter is `A` for audio encoders, followed by the encoder name. The legend
/// above the `------` separator is skipped.
pub fn parse_audio_encoders(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("------"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            (flags.len() == 6 && flags.starts_with('A')).then(|| name.to_string())
        })
        .collect()
}
