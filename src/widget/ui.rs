//! Terminal user interface for the voice message widget.
//!
//! Renders the record/stop affordance with its countdown and input level, the
//! pending clip preview, and the attachment list, and maps keyboard input and
//! bracketed pastes (files dropped onto the terminal) to widget commands.

use std::io::{self, Stdout};
use std::path::PathBuf;

use anyhow::Result;
use crossterm::{
    event::{
        self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent,
        KeyEventKind, KeyModifiers,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Gauge, HighlightSpacing, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use super::VoiceMessage;
use crate::attachments::intake::parse_dropped_paths;
use crate::attachments::{Attachment, Origin};
use crate::capture::{CaptureHost, CaptureState, Clip, EncodingFormat};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const ACCENT: Color = Color::Rgb(185, 207, 212);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);
const HELP_FG: Color = Color::Rgb(100, 100, 100);
const RECORD_FG: Color = Color::Rgb(120, 200, 140);
const STOP_BG: Color = Color::Rgb(90, 20, 20);
const NOTICE_BG: Color = Color::Rgb(255, 0, 0);

/// User intent decoded from one input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetCommand {
    /// Nothing to do
    Continue,
    /// Start a recording (r)
    Record,
    /// Stop the recording (s or space)
    Stop,
    /// Add the pending clip to the attachments (k)
    Keep,
    /// Play the pending clip (p)
    Preview,
    /// Play the selected attachment (Enter)
    Play,
    SelectNext,
    SelectPrevious,
    /// Open the upload path prompt (o)
    OpenUpload,
    /// Files dropped, pasted, or entered in the upload prompt
    Upload(Vec<PathBuf>),
    /// Close the blocking notice (any key)
    DismissNotice,
    /// Leave the widget (q, Esc, Ctrl+C)
    Quit,
}

/// Maps a key press outside the upload prompt.
///
/// While a notice is open every key only dismisses it. The record affordance
/// is inert while recording and the stop affordance while idle.
pub fn map_key(key: KeyEvent, recording: bool, notice_open: bool) -> WidgetCommand {
    if notice_open {
        return WidgetCommand::DismissNotice;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => WidgetCommand::Quit,
        KeyCode::Char('q') | KeyCode::Esc => WidgetCommand::Quit,
        KeyCode::Char('r') if !recording => WidgetCommand::Record,
        KeyCode::Char('s') | KeyCode::Char(' ') if recording => WidgetCommand::Stop,
        KeyCode::Char('k') => WidgetCommand::Keep,
        KeyCode::Char('p') => WidgetCommand::Preview,
        KeyCode::Char('o') => WidgetCommand::OpenUpload,
        KeyCode::Enter => WidgetCommand::Play,
        KeyCode::Down => WidgetCommand::SelectNext,
        KeyCode::Up => WidgetCommand::SelectPrevious,
        _ => WidgetCommand::Continue,
    }
}

/// Terminal UI for the widget.
pub struct VoiceMessageTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    list_state: ListState,
    /// Upload prompt, open while `Some`
    prompt: Option<Input>,
    cleaned_up: bool,
}

impl VoiceMessageTui {
    /// Creates the TUI, entering raw mode and the alternate screen.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            list_state: ListState::default(),
            prompt: None,
            cleaned_up: false,
        })
    }

    /// Index of the highlighted attachment.
    pub fn selected(&self) -> Option<usize> {
        self.list_state.selected()
    }

    pub fn select_next(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let next = self.list_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.list_state.select(Some(next));
    }

    pub fn select_previous(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        let previous = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        self.list_state.select(Some(previous));
    }

    /// Waits up to 50ms for input and decodes it.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, recording: bool, notice_open: bool) -> Result<WidgetCommand> {
        if !event::poll(std::time::Duration::from_millis(50))? {
            return Ok(WidgetCommand::Continue);
        }

        let command = match event::read()? {
            Event::Paste(text) if !notice_open => {
                self.prompt = None;
                let paths = parse_dropped_paths(&text);
                tracing::debug!("Dropped/pasted {} path(s)", paths.len());
                WidgetCommand::Upload(paths)
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if self.prompt.is_some() && !notice_open {
                    self.handle_prompt_key(key)
                } else {
                    map_key(key, recording, notice_open)
                }
            }
            _ => WidgetCommand::Continue,
        };

        if command == WidgetCommand::OpenUpload {
            self.prompt = Some(Input::default());
            return Ok(WidgetCommand::Continue);
        }
        Ok(command)
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> WidgetCommand {
        let Some(input) = self.prompt.as_mut() else {
            return WidgetCommand::Continue;
        };
        match key.code {
            KeyCode::Enter => {
                let paths = parse_dropped_paths(input.value());
                self.prompt = None;
                WidgetCommand::Upload(paths)
            }
            KeyCode::Esc => {
                self.prompt = None;
                WidgetCommand::Continue
            }
            _ => {
                input.handle_event(&Event::Key(key));
                WidgetCommand::Continue
            }
        }
    }

    /// Draws the widget.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render<H: CaptureHost>(&mut self, widget: &VoiceMessage<H>) -> Result<()> {
        let len = widget.attachments().len();
        match self.list_state.selected() {
            None if len > 0 => self.list_state.select(Some(0)),
            Some(i) if i >= len && len > 0 => self.list_state.select(Some(len - 1)),
            _ => {}
        }

        let recording = widget.state() == CaptureState::Recording;
        let time_left = widget.time_left();
        let max_duration = widget.capture().max_duration();
        let format = widget.capture().recording_format();
        let level = widget.input_level();
        let pending = widget.pending_clip();
        let empty = widget.attachments().is_empty();
        let items: Vec<ListItem> = widget.attachments().iter().map(attachment_item).collect();
        let status = widget.status().map(str::to_string);
        let notice = widget.notice().map(str::to_string);
        let prompt = self
            .prompt
            .as_ref()
            .map(|input| (input.value().to_string(), input.visual_cursor()));
        let list_state = &mut self.list_state;

        self.terminal.draw(|frame| {
            let area = frame.area();

            let padding_block = Block::default()
                .padding(Padding::uniform(1))
                .style(Style::default().fg(FG).bg(BG));
            frame.render_widget(&padding_block, area);
            let inner = padding_block.inner(area);

            let pending_height = if pending.is_some() { 4 } else { 0 };
            let [header_area, action_area, pending_area, list_area, footer_area] =
                Layout::vertical([
                    Constraint::Length(2),
                    Constraint::Length(4),
                    Constraint::Length(pending_height),
                    Constraint::Min(3),
                    Constraint::Length(1),
                ])
                .areas(inner);

            frame.render_widget(
                Paragraph::new("Voice Message").style(Style::default().fg(FG).bold()),
                header_area,
            );

            if recording {
                render_recording(frame, action_area, time_left, level, format);
            } else {
                render_actions(frame, action_area, max_duration);
            }

            if let Some(clip) = pending {
                render_pending(frame, pending_area, clip);
            }

            let list_block = Block::default()
                .title(format!(" Attachments ({len}) "))
                .borders(Borders::ALL);
            if empty {
                let placeholder = Paragraph::new("No attachments yet")
                    .style(Style::default().fg(HELP_FG))
                    .alignment(Alignment::Center)
                    .block(list_block);
                frame.render_widget(placeholder, list_area);
            } else {
                let list = List::new(items)
                    .block(list_block)
                    .highlight_style(Style::default().bg(HIGHLIGHT_BG))
                    .highlight_symbol("> ")
                    .highlight_spacing(HighlightSpacing::Always);
                frame.render_stateful_widget(list, list_area, list_state);
            }

            let footer = match &status {
                Some(message) => Paragraph::new(message.as_str()).style(Style::default().fg(ACCENT)),
                None => Paragraph::new(help_text(recording, pending.is_some()))
                    .style(Style::default().fg(HELP_FG)),
            };
            frame.render_widget(footer.alignment(Alignment::Center), footer_area);

            if let Some((value, cursor)) = &prompt {
                render_prompt(frame, area, value, *cursor);
            }
            if let Some(message) = &notice {
                render_notice(frame, area, message);
            }
        })?;

        Ok(())
    }

    /// Restores the terminal. Safe to call more than once.
    ///
    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> Result<()> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;

        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableBracketedPaste,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        tracing::debug!("Widget terminal cleanup complete");
        Ok(())
    }
}

impl Drop for VoiceMessageTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn render_actions(frame: &mut Frame, area: Rect, max_duration: u32) {
    let [record_area, upload_area] =
        Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);

    let record = Paragraph::new(format!(
        "● Record  [r]\nup to {}",
        format_duration(u64::from(max_duration))
    ))
        .alignment(Alignment::Center)
        .style(Style::default().fg(RECORD_FG))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(record, record_area);

    let upload = Paragraph::new("Upload pre-recorded audio  [o]\nor drop files onto this window")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(upload, upload_area);
}

fn render_recording(
    frame: &mut Frame,
    area: Rect,
    time_left: u32,
    level: u8,
    format: Option<EncodingFormat>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(STOP_BG).fg(FG));
    frame.render_widget(&block, area);
    let inner = block.inner(area);

    let [label_area, gauge_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(inner);

    let mut spans = vec![
        Span::styled("● ", Style::default().fg(Color::Red)),
        Span::raw(format!("Stop Recording ({time_left}s)  [s]")),
    ];
    if let Some(format) = format {
        spans.push(Span::styled(format!("  {format}"), Style::default().fg(HELP_FG)));
    }
    let label = Line::from(spans);
    frame.render_widget(Paragraph::new(label).alignment(Alignment::Center), label_area);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(ACCENT).bg(BG))
        .percent(u16::from(level.min(100)))
        .label(format!("{level}%"));
    frame.render_widget(gauge, gauge_area);
}

fn render_pending(frame: &mut Frame, area: Rect, clip: &Clip) {
    let text = vec![
        Line::from(format!(
            "{} · {} · {}",
            clip.format(),
            format_duration(clip.duration().as_secs()),
            format_size(clip.payload().len())
        )),
        Line::styled("[p] preview   [k] add to attachments", Style::default().fg(HELP_FG)),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().title(" New recording ").borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

fn render_prompt(frame: &mut Frame, screen: Rect, value: &str, cursor: usize) {
    let area = Rect {
        x: screen.x + 2.min(screen.width),
        y: screen.y + screen.height.saturating_sub(5),
        width: screen.width.saturating_sub(4),
        height: 3,
    }
    .intersection(screen);
    if area.is_empty() {
        return;
    }
    frame.render_widget(Clear, area);
    let block = Block::default()
        .title(" Audio file path(s), Enter to add, Esc to cancel ")
        .borders(Borders::ALL)
        .style(Style::default().fg(FG).bg(BG));
    frame.render_widget(&block, area);
    let inner = block.inner(area);

    let scroll = cursor.saturating_sub(inner.width.saturating_sub(1) as usize);
    frame.render_widget(Paragraph::new(value).scroll((0, scroll as u16)), inner);
    if !inner.is_empty() {
        frame.set_cursor_position(Position::new(
            inner.x + (cursor - scroll) as u16,
            inner.y,
        ));
    }
}

/// Blocking notice: red modal, dismissed by any key.
fn render_notice(frame: &mut Frame, screen: Rect, message: &str) {
    let area = notice_area(screen);
    if area.is_empty() {
        return;
    }
    frame.render_widget(Clear, area);

    let style = Style::default().fg(FG).bg(NOTICE_BG);
    let block = Block::default().borders(Borders::ALL).style(style);
    let text = vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from("Press any key to continue"),
    ];
    let paragraph = Paragraph::new(text)
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(block);
    frame.render_widget(paragraph, area);
}

/// Modal rectangle: 80% wide, up to 7 rows, a third of the way down, always
/// inside `screen`.
fn notice_area(screen: Rect) -> Rect {
    let width = (u32::from(screen.width) * 80 / 100) as u16;
    let height = 7.min(screen.height);
    let top = (screen.height / 3).min(screen.height - height);
    Rect {
        x: screen.x + (screen.width - width) / 2,
        y: screen.y + top,
        width,
        height,
    }
    .intersection(screen)
}

fn attachment_item(attachment: &Attachment) -> ListItem<'static> {
    let origin = match attachment.origin() {
        Origin::Recorded => "recorded",
        Origin::Uploaded => "uploaded",
    };
    let details = Line::styled(
        format!(
            "{} · {} · {} {}",
            attachment.media_type(),
            format_size(attachment.size()),
            origin,
            attachment.added_at().format("%H:%M:%S")
        ),
        Style::default().fg(HELP_FG),
    );
    ListItem::new(vec![Line::from(attachment.name().to_string()), details])
}

fn help_text(recording: bool, pending: bool) -> &'static str {
    match (recording, pending) {
        (true, _) => "s/space stop, q quit",
        (false, true) => "r record, p preview, k keep, o upload, ↑↓ select, ↵ play, q quit",
        (false, false) => "r record, o upload, ↑↓ select, ↵ play, q quit",
    }
}

/// Formats seconds as `m:ss`.
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Formats a byte count with a binary unit.
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;

    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_record_only_when_idle() {
        assert_eq!(map_key(key(KeyCode::Char('r')), false, false), WidgetCommand::Record);
        assert_eq!(map_key(key(KeyCode::Char('r')), true, false), WidgetCommand::Continue);
    }

    #[test]
    fn test_stop_only_when_recording() {
        assert_eq!(map_key(key(KeyCode::Char('s')), true, false), WidgetCommand::Stop);
        assert_eq!(map_key(key(KeyCode::Char(' ')), true, false), WidgetCommand::Stop);
        assert_eq!(map_key(key(KeyCode::Char('s')), false, false), WidgetCommand::Continue);
    }

    #[test]
    fn test_notice_swallows_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Char('r'), KeyCode::Enter, KeyCode::Esc] {
            assert_eq!(map_key(key(code), false, true), WidgetCommand::DismissNotice);
        }
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(map_key(key(KeyCode::Esc), true, false), WidgetCommand::Quit);
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), false, false),
            WidgetCommand::Quit
        );
    }

    #[test]
    fn test_other_keys() {
        assert_eq!(map_key(key(KeyCode::Char('k')), false, false), WidgetCommand::Keep);
        assert_eq!(map_key(key(KeyCode::Char('p')), false, false), WidgetCommand::Preview);
        assert_eq!(map_key(key(KeyCode::Char('o')), false, false), WidgetCommand::OpenUpload);
        assert_eq!(map_key(key(KeyCode::Enter), false, false), WidgetCommand::Play);
        assert_eq!(map_key(key(KeyCode::Down), false, false), WidgetCommand::SelectNext);
        assert_eq!(map_key(key(KeyCode::Up), false, false), WidgetCommand::SelectPrevious);
        assert_eq!(map_key(key(KeyCode::Char('x')), false, false), WidgetCommand::Continue);
    }

    fn draw_notice(width: u16, height: u16) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|frame| render_notice(frame, frame.area(), "Microphone permission denied"))
            .unwrap();
        terminal.backend().buffer().clone()
    }

    #[test]
    fn test_notice_fits_short_terminals() {
        for height in [1, 3, 8, 9, 10, 24] {
            let buffer = draw_notice(80, height);
            assert_eq!(buffer.area.height, height);
        }
    }

    #[test]
    fn test_notice_is_drawn_inside_screen() {
        let screen = Rect::new(0, 0, 80, 9);
        let area = notice_area(screen);
        assert_eq!(area.height, 7);
        assert!(area.bottom() <= screen.bottom());

        let buffer = draw_notice(80, 9);
        assert_eq!(buffer[(area.x, area.y)].bg, NOTICE_BG);
    }

    #[test]
    fn test_notice_on_very_wide_terminal() {
        let area = notice_area(Rect::new(0, 0, 1000, 40));
        assert_eq!(area.width, 800);
        assert_eq!(area.x, 100);
    }

    #[test]
    fn test_prompt_fits_short_terminals() {
        for height in [1, 2, 4, 24] {
            let mut terminal = Terminal::new(TestBackend::new(40, height)).unwrap();
            terminal
                .draw(|frame| render_prompt(frame, frame.area(), "memo.wav", 8))
                .unwrap();
        }
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MiB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5), "0:05");
        assert_eq!(format_duration(300), "5:00");
    }
}
