//! Terminal user interface with ratatui, plus the raw line renderer.
//!
//! Neither renderer mutates state. The raw renderer also mirrors the
//! remaining time to a status file for status bars to pick up.

use crate::app::AppState;
use crate::keymap::Binding;
use crate::runtime::Presenter;
use anyhow::Result;
use chrono::{DateTime, Local};
use ratatui::{
    Frame, Terminal,
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Text shown once the countdown has run out.
pub const DONE_TEXT: &str = "All done!";

/// Colors for the UI.
pub struct UiColors {
    pub accent: Color,
    pub paused: Color,
    pub done: Color,
    pub gauge: Color,
    pub help_key: Color,
    pub help_desc: Color,
    pub border: Color,
}

impl Default for UiColors {
    fn default() -> Self {
        Self {
            accent: Color::Cyan,
            paused: Color::Yellow,
            done: Color::Green,
            gauge: Color::Rgb(150, 100, 60),
            help_key: Color::Yellow,
            help_desc: Color::DarkGray,
            border: Color::DarkGray,
        }
    }
}

/// Format a duration the way the timer displays it, e.g. `3m 59s`.
pub fn format_remaining(remaining: Duration) -> String {
    humantime::format_duration(remaining).to_string()
}

/// Render the full-screen UI.
pub fn render(frame: &mut Frame, state: &AppState) {
    let colors = UiColors::default();
    let area = centered_rect(60, 50, frame.area());

    if state.timer.expired {
        render_done(frame, state, area, &colors);
    } else if state.is_counting() {
        render_countdown(frame, state, area, &colors);
    } else {
        let text = Paragraph::new(format_remaining(state.timer.remaining))
            .alignment(Alignment::Center);
        frame.render_widget(text, area);
    }
}

/// Render the countdown with progress and key help.
fn render_countdown(frame: &mut Frame, state: &AppState, area: Rect, colors: &UiColors) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Remaining time
            Constraint::Length(3), // Progress
            Constraint::Length(1), // Status
            Constraint::Min(0),
            Constraint::Length(1), // Help
        ])
        .split(area);

    let remaining = Paragraph::new(Line::from(vec![
        Span::raw("Time remaining: "),
        Span::styled(
            format_remaining(state.timer.remaining),
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title(" cofe ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border)),
    );
    frame.render_widget(remaining, chunks[0]);

    let progress = state.timer.progress();
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(colors.gauge))
        .ratio(progress)
        .label(format!("{:.0}%", progress * 100.0));
    frame.render_widget(gauge, chunks[1]);

    let status = if state.timer.running {
        match finish_time(state.timer.remaining) {
            Some(finish) => Line::from(Span::raw(format!(
                "Done at {}",
                finish.format("%H:%M:%S")
            ))),
            None => Line::default(),
        }
    } else {
        Line::from(Span::styled(
            "Paused",
            Style::default()
                .fg(colors.paused)
                .add_modifier(Modifier::BOLD),
        ))
    };
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), chunks[2]);

    let help = Paragraph::new(help_line(&state.keymap.running_help(), colors))
        .alignment(Alignment::Center);
    frame.render_widget(help, chunks[4]);
}

/// Wall-clock time the countdown ends, if it is representable.
fn finish_time(remaining: Duration) -> Option<DateTime<Local>> {
    let delta = chrono::Duration::from_std(remaining).ok()?;
    Local::now().checked_add_signed(delta)
}

/// Render the done screen.
fn render_done(frame: &mut Frame, state: &AppState, area: Rect, colors: &UiColors) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    let title = if state.is_alerting() {
        format!("{DONE_TEXT} \u{266a}")
    } else {
        DONE_TEXT.to_string()
    };
    let done = Paragraph::new(Span::styled(
        title,
        Style::default().fg(colors.done).add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.done)),
    );
    frame.render_widget(done, chunks[0]);

    let help = Paragraph::new(help_line(&state.keymap.done_help(), colors))
        .alignment(Alignment::Center);
    frame.render_widget(help, chunks[2]);
}

/// Short help such as `s stop • r reset • q quit`.
fn help_line(bindings: &[&Binding], colors: &UiColors) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, binding) in bindings.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", Style::default().fg(colors.help_desc)));
        }
        spans.push(Span::styled(
            binding.help_key,
            Style::default().fg(colors.help_key),
        ));
        spans.push(Span::styled(
            format!(" {}", binding.help_desc),
            Style::default().fg(colors.help_desc),
        ));
    }
    Line::from(spans)
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Full-screen presenter over any ratatui backend.
pub struct TuiPresenter<B: Backend> {
    terminal: Terminal<B>,
}

impl<B: Backend> TuiPresenter<B> {
    pub fn new(terminal: Terminal<B>) -> Self {
        Self { terminal }
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }
}

impl<B> Presenter for TuiPresenter<B>
where
    B: Backend,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    fn render(&mut self, state: &AppState) -> Result<()> {
        self.terminal.draw(|f| render(f, state))?;
        Ok(())
    }
}

/// Render raw mode output (non-interactive).
pub fn render_raw(state: &AppState) -> String {
    if state.timer.expired {
        DONE_TEXT.to_string()
    } else {
        format_remaining(state.timer.remaining)
    }
}

/// Overwrite the status file with the remaining time. Best-effort.
pub fn write_status(path: &Path, state: &AppState) {
    let text = format_remaining(state.timer.remaining);
    if let Err(e) = fs::write(path, text) {
        warn!("Failed to write status file {}: {}", path.display(), e);
    }
}

/// Line-oriented presenter that also feeds the status file.
pub struct RawPresenter<W: Write> {
    out: W,
    status_file: PathBuf,
}

impl<W: Write> RawPresenter<W> {
    pub fn new(out: W, status_file: PathBuf) -> Self {
        Self { out, status_file }
    }
}

impl<W: Write> Presenter for RawPresenter<W> {
    fn render(&mut self, state: &AppState) -> Result<()> {
        write_status(&self.status_file, state);
        writeln!(self.out, "{}", render_raw(state))?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Event;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;

    fn screen_text(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| render(f, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn expired_state() -> AppState {
        let state = AppState::new(Some(Duration::from_secs(1)), false);
        state.update(Event::Tick(Duration::from_secs(1))).0
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(240)), "4m");
        assert_eq!(format_remaining(Duration::from_secs(239)), "3m 59s");
        assert_eq!(format_remaining(Duration::ZERO), "0s");
    }

    #[test]
    fn test_countdown_screen() {
        let text = screen_text(&AppState::new(Some(Duration::from_secs(90)), false));
        assert!(text.contains("Time remaining"));
        assert!(text.contains("1m 30s"));
        assert!(text.contains("stop"));
        assert!(text.contains("reset"));
        assert!(!text.contains("start"));
        assert!(text.contains("Done at"));
    }

    #[test]
    fn test_countdown_past_calendar_end() {
        let mut state = AppState::new(None, false);
        state.timer.remaining = Duration::from_secs(31_557_600_000_000);
        state.timer.total_timeout = state.timer.remaining;

        assert!(finish_time(state.timer.remaining).is_none());
        let text = screen_text(&state);
        assert!(text.contains("Time remaining"));
        assert!(!text.contains("Done at"));
    }

    #[test]
    fn test_paused_screen() {
        let state = AppState::new(None, false);
        let s = Event::Key(KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE));
        let (state, _) = state.update(s);
        let text = screen_text(&state);
        assert!(text.contains("Paused"));
        assert!(text.contains("start"));
    }

    #[test]
    fn test_done_screen() {
        let text = screen_text(&expired_state());
        assert!(text.contains(DONE_TEXT));
        assert!(text.contains("reset"));
        assert!(text.contains("quit"));
        assert!(!text.contains("Time remaining"));
    }

    #[test]
    fn test_render_raw() {
        let state = AppState::new(Some(Duration::from_secs(90)), true);
        assert_eq!(render_raw(&state), "1m 30s");
        assert_eq!(render_raw(&expired_state()), DONE_TEXT);
    }

    #[test]
    fn test_raw_presenter_writes_status_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status");
        let mut presenter = RawPresenter::new(Vec::new(), path.clone());

        presenter
            .render(&AppState::new(Some(Duration::from_secs(90)), true))
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1m 30s");

        presenter.render(&expired_state()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "0s");

        let out = String::from_utf8(presenter.out).unwrap();
        assert_eq!(out, "1m 30s\nAll done!\n");
    }

    #[test]
    fn test_unwritable_status_file_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("status");
        let mut presenter = RawPresenter::new(Vec::new(), path);
        assert!(presenter.render(&AppState::new(None, true)).is_ok());
    }
}
