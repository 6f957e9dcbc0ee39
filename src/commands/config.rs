//! Configuration file editor command.

use std::path::Path;
use std::process::Command;

use crate::config::{get_config_path, VmsgConfig};

/// Opens the config file in the user's editor, writing the defaults first if
/// the file does not exist yet.
///
/// Editors are tried in this order: `$EDITOR`, nano, vi.
///
/// # Errors
/// - If the config file cannot be created
/// - If no editor can be found or it exits with an error
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    ensure_config_file(&config_path)?;

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    // Surface mistakes now rather than on the next recording.
    VmsgConfig::load_from(&config_path)?;
    tracing::info!("Config file edited successfully");
    Ok(())
}

fn ensure_config_file(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        return Ok(());
    }
    VmsgConfig::default().save_to(path)
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in ["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
