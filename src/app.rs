//! Application state and the event reducer.
//!
//! Every change to the timer goes through [`AppState::update`]: one event in,
//! the next state and a list of commands out. Nothing in here touches the
//! clock task, the speaker or the terminal.

use crate::clock::TimerState;
use crate::keymap::KeyMap;
use crossterm::event::KeyEvent;
use std::time::Duration;
use tracing::debug;

/// Everything the event loop can deliver to the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The tick source fired; carries the time that passed.
    Tick(Duration),
    /// A key was pressed.
    Key(KeyEvent),
    /// The countdown reached zero.
    TimerExpired,
    /// The alert finished playing on its own.
    SoundFinished,
    /// The terminal changed size.
    Resize,
}

/// Side effects requested by the reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartClock,
    StopClock,
    StartSound,
    StopSound,
    Terminate,
}

/// Application state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub timer: TimerState,
    /// Set on quit, and on expiry to switch to the done screen
    pub quitting: bool,
    /// A playback was started and has not finished or been stopped
    pub sound_playing: bool,
    /// Line-oriented output instead of the full-screen UI
    pub raw_mode: bool,
    pub keymap: KeyMap,
}

impl AppState {
    /// Create the state for a fresh, running countdown.
    pub fn new(timeout: Option<Duration>, raw_mode: bool) -> Self {
        let timer = TimerState::new(timeout);
        let mut keymap = KeyMap::new();
        keymap.sync_running(timer.running);

        Self {
            timer,
            quitting: false,
            sound_playing: false,
            raw_mode,
            keymap,
        }
    }

    /// Commands to run before the first event.
    pub fn init(&self) -> Vec<Command> {
        if self.timer.running {
            vec![Command::StartClock]
        } else {
            Vec::new()
        }
    }

    /// Still counting down (running or paused).
    pub fn is_counting(&self) -> bool {
        !self.quitting && !self.timer.expired
    }

    /// Expired and the alert is still playing.
    pub fn is_alerting(&self) -> bool {
        self.timer.expired && self.sound_playing
    }

    /// Apply one event.
    pub fn update(mut self, event: Event) -> (Self, Vec<Command>) {
        let mut commands = Vec::new();

        match event {
            Event::Tick(elapsed) => {
                if self.timer.running && !self.timer.expired {
                    self.timer.tick(elapsed);
                    if self.timer.timed_out() {
                        self.timer.expired = true;
                        self.timer.stop();
                        self.keymap.sync_running(false);
                        commands.push(Command::StopClock);

                        let (next, more) = self.update(Event::TimerExpired);
                        self = next;
                        commands.extend(more);
                    }
                }
            }

            Event::TimerExpired => {
                self.quitting = true;
                if !self.sound_playing {
                    self.sound_playing = true;
                    commands.push(Command::StartSound);
                }
            }

            Event::SoundFinished => {
                self.sound_playing = false;
            }

            Event::Key(key) => {
                if self.keymap.quit.matches(&key) {
                    self.quitting = true;
                    if self.sound_playing {
                        self.sound_playing = false;
                        commands.push(Command::StopSound);
                    }
                    commands.push(Command::Terminate);
                } else if self.keymap.reset.matches(&key) {
                    if self.sound_playing {
                        self.sound_playing = false;
                        commands.push(Command::StopSound);
                    }
                    self.timer.reset();
                    self.keymap.sync_running(true);
                    self.quitting = false;
                    commands.push(Command::StartClock);
                } else if (self.keymap.start.matches(&key) || self.keymap.stop.matches(&key))
                    && !self.timer.expired
                {
                    let running = self.timer.toggle();
                    self.keymap.sync_running(running);
                    commands.push(if running {
                        Command::StartClock
                    } else {
                        Command::StopClock
                    });
                }
            }

            Event::Resize => {}
        }

        if !commands.is_empty() {
            debug!(?event, ?commands, remaining = ?self.timer.remaining, "transition");
        }

        (self, commands)
    }
}
