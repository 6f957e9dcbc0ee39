//! The voice message widget command.
//!
//! Wires the cpal capture host, the countdown channel, the attachment list and
//! the terminal UI together and runs the event loop until the user quits.

use std::path::PathBuf;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::attachments::{intake, Player};
use crate::capture::{CaptureController, CaptureHost, CpalHost, Tick};
use crate::config::VmsgConfig;
use crate::widget::{VoiceMessage, VoiceMessageTui, WidgetCommand};

/// Runs the widget.
///
/// `max_duration` overrides `widget.max_recording_secs`; `files` are added to
/// the attachment list before the first frame, filtered like dropped files.
///
/// # Errors
/// - If the configuration is invalid
/// - If the terminal cannot be initialized or drawn
pub async fn handle_record(max_duration: Option<u32>, files: Vec<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("=== vmsg voice message widget started ===");

    let mut config = VmsgConfig::load().context("Configuration error")?;
    if let Some(secs) = max_duration {
        config.widget.max_recording_secs = secs;
        config.validate().context("Invalid --max-duration")?;
    }

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, max_recording={}s, formats={:?}",
        config.audio.device,
        config.audio.sample_rate,
        config.widget.max_recording_secs,
        config.widget.formats
    );

    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let host = CpalHost::new(&config.audio);
    let controller = CaptureController::new(
        host,
        config.widget.formats.clone(),
        config.widget.max_recording_secs,
        tick_tx,
    );
    let mut widget = VoiceMessage::new(controller);
    let player = Player::new(config.playback.player.clone());

    if !files.is_empty() {
        widget.drop_files(intake::load_paths(&files));
    }

    let mut tui = VoiceMessageTui::new().context("Failed to initialize UI")?;
    let result = run_widget(&mut widget, &mut tui, &mut tick_rx, &player);

    // Quitting mid-recording discards the take and stops the countdown.
    widget.stop_recording();
    if widget.capture().timer_active() {
        tracing::warn!("Countdown still running after stop");
    }
    tui.cleanup()?;
    player.cleanup();

    let count = widget.attachments().len();
    tracing::info!("=== vmsg exiting with {} attachment(s) ===", count);
    result
}

fn run_widget<H: CaptureHost>(
    widget: &mut VoiceMessage<H>,
    tui: &mut VoiceMessageTui,
    ticks: &mut mpsc::UnboundedReceiver<Tick>,
    player: &Player,
) -> anyhow::Result<()> {
    loop {
        while let Ok(tick) = ticks.try_recv() {
            widget.on_tick(tick);
        }

        tui.render(widget)
            .map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;

        let recording = widget.capture().is_recording();
        let command = tui
            .handle_input(recording, widget.notice().is_some())
            .map_err(|e| anyhow::anyhow!("Input handling error: {e}"))?;

        match command {
            WidgetCommand::Continue | WidgetCommand::OpenUpload => {}
            WidgetCommand::Record => widget.start_recording(),
            WidgetCommand::Stop => widget.stop_recording(),
            WidgetCommand::Keep => widget.keep_recording(),
            WidgetCommand::Preview => {
                if let Some(clip) = widget.pending_clip() {
                    let name = format!("preview.{}", clip.format().extension());
                    if let Err(e) = player.play(&name, clip.payload()) {
                        tracing::warn!("Preview failed: {}", e);
                        widget.set_status(format!("Preview failed: {e}"));
                    }
                }
            }
            WidgetCommand::Play => {
                let selected = tui.selected().and_then(|i| widget.attachments().get(i));
                if let Some(attachment) = selected {
                    if let Err(e) = player.play(attachment.name(), attachment.payload()) {
                        tracing::warn!("Playback failed: {}", e);
                        widget.set_status(format!("Playback failed: {e}"));
                    }
                }
            }
            WidgetCommand::SelectNext => tui.select_next(widget.attachments().len()),
            WidgetCommand::SelectPrevious => tui.select_previous(widget.attachments().len()),
            WidgetCommand::Upload(paths) => {
                widget.drop_files(intake::load_paths(&paths));
            }
            WidgetCommand::DismissNotice => widget.dismiss_notice(),
            WidgetCommand::Quit => {
                tracing::debug!("Quit requested");
                return Ok(());
            }
        }
    }
}
