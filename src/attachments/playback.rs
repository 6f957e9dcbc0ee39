//! Playback of attachments and pending clips through the system player.
//!
//! The payload is written to a per-process scratch directory under the system
//! temp dir and handed to the configured player, or to the platform opener:
//! `open` on macOS, `xdg-open` on Linux with mpv, vlc, ffplay and paplay as
//! fallbacks. The player runs detached from the TUI; its exit is reaped on a
//! blocking tokio task.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};

/// Staged files get a fresh prefix so equal names never share a file.
static NEXT_STAGE: AtomicU64 = AtomicU64::new(1);

/// Launches players for in-memory payloads.
#[derive(Debug, Clone)]
pub struct Player {
    /// Explicit player command, e.g. "mpv --no-video"
    command: Option<String>,
    scratch_dir: PathBuf,
}

impl Player {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command,
            scratch_dir: std::env::temp_dir().join(format!("vmsg-{}", std::process::id())),
        }
    }

    /// Writes `payload` under `name` and starts playing it.
    ///
    /// # Errors
    /// - If the scratch file cannot be written
    /// - If no player can be started
    pub fn play(&self, name: &str, payload: &[u8]) -> Result<()> {
        let path = self.stage(name, payload)?;
        let child = self.spawn(&path)?;
        tracing::info!("Playing {}", path.display());

        let name = name.to_string();
        tokio::task::spawn_blocking(move || wait_for(child, &name));
        Ok(())
    }

    fn stage(&self, name: &str, payload: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.scratch_dir).with_context(|| {
            format!(
                "Failed to create playback directory {}",
                self.scratch_dir.display()
            )
        })?;
        let n = NEXT_STAGE.fetch_add(1, Ordering::Relaxed);
        let path = self
            .scratch_dir
            .join(format!("{n}-{}", sanitize_file_name(name)));
        std::fs::write(&path, payload)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    fn spawn(&self, path: &Path) -> Result<Child> {
        if let Some(command) = &self.command {
            let mut parts = command.split_whitespace();
            let program = parts
                .next()
                .ok_or_else(|| anyhow!("Configured player command is empty"))?;
            return quiet(Command::new(program).args(parts).arg(path))
                .spawn()
                .map_err(|e| anyhow!("Failed to start player '{program}': {e}"));
        }
        spawn_system_player(path)
    }

    /// Removes staged payloads.
    pub fn cleanup(&self) {
        if self.scratch_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.scratch_dir) {
                tracing::debug!("Failed to remove playback directory: {}", e);
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn spawn_system_player(path: &Path) -> Result<Child> {
    quiet(Command::new("open").arg(path))
        .spawn()
        .map_err(|e| anyhow!("Failed to open audio player: {e}"))
}

#[cfg(not(target_os = "macos"))]
fn spawn_system_player(path: &Path) -> Result<Child> {
    if let Ok(child) = quiet(Command::new("xdg-open").arg(path)).spawn() {
        return Ok(child);
    }
    for player in ["mpv", "vlc", "ffplay", "paplay"] {
        if let Ok(child) = quiet(Command::new(player).arg(path)).spawn() {
            return Ok(child);
        }
    }
    Err(anyhow!(
        "No audio player found. Install mpv, vlc, ffplay, or paplay"
    ))
}

/// Keeps player output off the TUI.
fn quiet(command: &mut Command) -> &mut Command {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

fn wait_for(mut child: Child, name: &str) {
    match child.wait() {
        Ok(status) if status.success() => tracing::debug!("Playback finished for {}", name),
        Ok(status) => tracing::warn!("Player exited with {} for {}", status, name),
        Err(e) => tracing::warn!("Audio player error: {}", e),
    }
}

/// Strips path separators so an attachment name stays inside the scratch dir.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "attachment".to_string(),
        rest => rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("voice.wav"), "voice.wav");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_file_name(".."), "attachment");
    }

    #[test]
    fn test_stage_writes_payload() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player {
            command: None,
            scratch_dir: dir.path().join("scratch"),
        };
        let path = player.stage("clip.wav", b"RIFF").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
        assert!(path.starts_with(dir.path()));

        player.cleanup();
        assert!(!dir.path().join("scratch").exists());
    }

    #[test]
    fn test_equal_names_are_staged_separately() {
        let dir = tempfile::tempdir().unwrap();
        let player = Player {
            command: None,
            scratch_dir: dir.path().to_path_buf(),
        };
        let first = player.stage("memo.wav", b"first").unwrap();
        let second = player.stage("memo.wav", b"second").unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
        assert!(second.to_string_lossy().ends_with("-memo.wav"));
    }

    #[test]
    fn test_empty_player_command_is_an_error() {
        let player = Player::new(Some("   ".to_string()));
        assert!(player.spawn(Path::new("/tmp/x.wav")).is_err());
    }
}
