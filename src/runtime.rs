//! Event loop plumbing.
//!
//! Keyboard input, signals and the alert worker all post [`Event`]s into one
//! unbounded channel. Each tick task gets a channel of its own, dropped when
//! the clock stops or restarts, so a tick from a retired ticker never reaches
//! the reducer. The loop pulls events one at a time, hands each to the
//! reducer, then executes the returned commands.

use crate::app::{AppState, Command, Event};
use crate::sound::SoundController;
use anyhow::Result;
use crossterm::event::{
    Event as TermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

/// How the loop should continue after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Flow {
    Continue,
    /// Render once more, wait, then exit
    Linger(Duration),
    Exit,
}

impl Flow {
    /// Combine two flows, keeping the one that ends the loop soonest.
    pub fn then(self, other: Flow) -> Flow {
        self.max(other)
    }
}

/// Which front end is driving the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Interactive,
    Raw { grace: Duration },
}

/// Renders state; never mutates it.
pub trait Presenter {
    fn render(&mut self, state: &AppState) -> Result<()>;
}

/// Owns the event channel and everything that feeds it.
pub struct Runtime {
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
    tick_interval: Duration,
    ticker: Option<JoinHandle<()>>,
    ticks: Option<UnboundedReceiver<Duration>>,
    inputs: Vec<JoinHandle<()>>,
    sound: SoundController,
    mode: Mode,
}

impl Runtime {
    pub fn new(tick_interval: Duration, sound: SoundController, mode: Mode) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx,
            tick_interval,
            ticker: None,
            ticks: None,
            inputs: Vec::new(),
            sound,
            mode,
        }
    }

    /// A handle for posting events into the loop.
    pub fn sender(&self) -> UnboundedSender<Event> {
        self.events_tx.clone()
    }

    /// Forward terminal key presses and resizes.
    pub fn spawn_terminal_input(&mut self) {
        let tx = self.sender();
        self.inputs.push(tokio::spawn(async move {
            let mut stream = EventStream::new();
            while let Some(next) = stream.next().await {
                let event = match next {
                    Ok(TermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
                    Ok(TermEvent::Resize(_, _)) => Event::Resize,
                    Ok(_) => continue,
                    Err(e) => {
                        error!("terminal input failed: {e}");
                        break;
                    }
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
        }));
    }

    /// Deliver ctrl-c as the quit key when the terminal is not in raw mode.
    pub fn spawn_interrupt_handler(&mut self) {
        let tx = self.sender();
        self.inputs.push(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                let interrupt = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
                if tx.send(Event::Key(interrupt)).is_err() {
                    break;
                }
            }
        }));
    }

    pub async fn next_event(&mut self) -> Option<Event> {
        let Self {
            events_rx, ticks, ..
        } = self;
        match ticks.as_mut() {
            Some(ticks) => tokio::select! {
                event = events_rx.recv() => event,
                Some(elapsed) = ticks.recv() => Some(Event::Tick(elapsed)),
            },
            None => events_rx.recv().await,
        }
    }

    /// Carry out one reducer command.
    pub async fn execute(&mut self, command: Command) -> Flow {
        debug!(?command, "executing");
        match command {
            Command::StartClock => {
                self.start_clock();
                Flow::Continue
            }
            Command::StopClock => {
                self.stop_clock();
                Flow::Continue
            }
            Command::StartSound => {
                self.start_sound().await;
                match self.mode {
                    Mode::Interactive => Flow::Continue,
                    Mode::Raw { grace } => Flow::Linger(grace),
                }
            }
            Command::StopSound => {
                self.sound.stop_async().await;
                Flow::Continue
            }
            Command::Terminate => Flow::Exit,
        }
    }

    fn start_clock(&mut self) {
        self.stop_clock();

        let period = self.tick_interval;
        let Some(first) = Instant::now().checked_add(period) else {
            error!(?period, "tick interval out of range, clock not started");
            return;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        self.ticks = Some(rx);
        self.ticker = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(period).is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_clock(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.ticks = None;
    }

    async fn start_sound(&mut self) {
        let tx = self.sender();
        if let Err(e) = self
            .sound
            .play_async(move || {
                let _ = tx.send(Event::SoundFinished);
            })
            .await
        {
            error!("alert playback failed: {e}");
            let _ = self.events_tx.send(Event::SoundFinished);
        }
    }

    /// Stop every background task and release the audio device.
    pub fn shutdown(&mut self) {
        self.stop_clock();
        for input in self.inputs.drain(..) {
            input.abort();
        }
        if self.sound.is_playing() {
            debug!("stopping alert on shutdown");
        }
        self.sound.stop();
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Drive `state` until a command ends the loop, rendering after every step.
pub async fn run<P: Presenter>(
    mut state: AppState,
    runtime: &mut Runtime,
    presenter: &mut P,
) -> Result<AppState> {
    debug!(
        raw = state.raw_mode,
        timeout = ?state.timer.total_timeout,
        "starting event loop"
    );
    let mut flow = Flow::Continue;
    for command in state.init() {
        flow = flow.then(runtime.execute(command).await);
    }

    loop {
        presenter.render(&state)?;

        match flow {
            Flow::Continue => {}
            Flow::Linger(grace) => {
                debug!(?grace, "lingering before exit");
                time::sleep(grace).await;
                break;
            }
            Flow::Exit => break,
        }

        let Some(event) = runtime.next_event().await else {
            warn!("event channel closed");
            break;
        };

        if event == Event::SoundFinished {
            runtime.sound.reap();
        }

        let (next, commands) = state.update(event);
        state = next;
        for command in commands {
            flow = flow.then(runtime.execute(command).await);
        }
    }

    runtime.shutdown();
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: Duration = Duration::from_millis(10);

    #[derive(Default)]
    struct Recorder {
        frames: Vec<AppState>,
    }

    impl Presenter for Recorder {
        fn render(&mut self, state: &AppState) -> Result<()> {
            self.frames.push(state.clone());
            Ok(())
        }
    }

    fn muted_runtime(mode: Mode) -> Runtime {
        let sound = SoundController::new(true).unwrap();
        Runtime::new(FAST, sound, mode)
    }

    fn quit_key() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE))
    }

    fn no_device() -> Result<(rodio::OutputStream, rodio::OutputStreamHandle), rodio::StreamError>
    {
        Err(rodio::StreamError::NoDevice)
    }

    #[test]
    fn test_flow_then() {
        assert_eq!(Flow::Continue.then(Flow::Exit), Flow::Exit);
        assert_eq!(Flow::Exit.then(Flow::Continue), Flow::Exit);
        let linger = Flow::Linger(Duration::from_secs(1));
        assert_eq!(Flow::Continue.then(linger), linger);
        assert_eq!(linger.then(Flow::Exit), Flow::Exit);
    }

    #[tokio::test]
    async fn test_raw_mode_runs_to_expiry() {
        let mut runtime = muted_runtime(Mode::Raw {
            grace: Duration::ZERO,
        });
        let mut recorder = Recorder::default();
        let state = AppState::new(Some(Duration::from_millis(30)), true);

        let state = run(state, &mut runtime, &mut recorder).await.unwrap();

        assert!(state.timer.expired);
        assert_eq!(state.timer.remaining, Duration::ZERO);
        let remaining: Vec<_> = recorder.frames.iter().map(|s| s.timer.remaining).collect();
        assert!(remaining.windows(2).all(|w| w[1] <= w[0]));
        assert!(recorder.frames.last().is_some_and(|s| s.timer.expired));
    }

    #[tokio::test]
    async fn test_quit_key_exits() {
        let mut runtime = muted_runtime(Mode::Interactive);
        let tx = runtime.sender();
        tx.send(Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)))
            .unwrap();

        let mut recorder = Recorder::default();
        let state = AppState::new(None, false);
        let state = run(state, &mut runtime, &mut recorder).await.unwrap();

        assert!(state.quitting);
        assert!(!state.timer.expired);
    }

    #[tokio::test]
    async fn test_muted_alert_reaches_silent_state() {
        let mut runtime = muted_runtime(Mode::Interactive);
        let tx = runtime.sender();
        let mut recorder = Recorder::default();
        let state = AppState::new(Some(FAST), false);

        // Quit as soon as the done screen has settled.
        let watcher = tokio::spawn(async move {
            time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        });

        let state = run(state, &mut runtime, &mut recorder).await.unwrap();
        watcher.await.unwrap();

        assert!(state.timer.expired);
        assert!(!state.sound_playing);
        assert!(recorder.frames.iter().any(AppState::is_alerting));
        let silent = recorder
            .frames
            .iter()
            .any(|s| s.timer.expired && !s.sound_playing);
        assert!(silent);
    }

    #[tokio::test]
    async fn test_failed_playback_reaches_silent_state() {
        let sound = SoundController::new(false)
            .unwrap()
            .with_output(no_device);
        let mut runtime = Runtime::new(FAST, sound, Mode::Interactive);
        let tx = runtime.sender();
        let mut recorder = Recorder::default();
        let state = AppState::new(Some(FAST), false);

        let watcher = tokio::spawn(async move {
            time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(quit_key());
        });

        let state = run(state, &mut runtime, &mut recorder).await.unwrap();
        watcher.await.unwrap();

        assert!(state.timer.expired);
        assert!(!state.sound_playing);
        assert!(!runtime.sound.is_playing());
        assert!(recorder.frames.iter().any(AppState::is_alerting));
        let silent = recorder
            .frames
            .iter()
            .any(|s| s.timer.expired && !s.sound_playing && s.quitting);
        assert!(silent);
    }

    #[tokio::test]
    async fn test_restart_discards_pending_ticks() {
        let period = Duration::from_millis(200);
        let sound = SoundController::new(true).unwrap();
        let mut runtime = Runtime::new(period, sound, Mode::Interactive);

        runtime.execute(Command::StartClock).await;
        time::sleep(period * 2 + period / 4).await;

        // Ticks from the first ticker are queued now; a restart drops them.
        runtime.execute(Command::StartClock).await;
        let early = time::timeout(period / 4, runtime.next_event()).await;
        assert!(early.is_err(), "stale tick delivered: {early:?}");

        let next = time::timeout(period * 2, runtime.next_event()).await;
        assert_eq!(next.ok().flatten(), Some(Event::Tick(period)));

        runtime.execute(Command::StopClock).await;
        time::sleep(period + period / 4).await;
        let after_stop = time::timeout(period / 4, runtime.next_event()).await;
        assert!(after_stop.is_err());
    }

    #[tokio::test]
    async fn test_out_of_range_interval_does_not_start_clock() {
        let sound = SoundController::new(true).unwrap();
        let mut runtime = Runtime::new(Duration::MAX, sound, Mode::Interactive);

        assert_eq!(runtime.execute(Command::StartClock).await, Flow::Continue);
        assert!(runtime.ticker.is_none());
        assert!(runtime.ticks.is_none());
    }

    #[tokio::test]
    async fn test_paused_clock_does_not_tick() {
        let mut runtime = muted_runtime(Mode::Interactive);
        let tx = runtime.sender();
        let s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE);
        tx.send(Event::Key(s)).unwrap();

        let watcher = tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE)));
        });

        let mut recorder = Recorder::default();
        let timeout = Duration::from_secs(60);
        let state = AppState::new(Some(timeout), false);
        let state = run(state, &mut runtime, &mut recorder).await.unwrap();
        watcher.await.unwrap();

        assert!(!state.timer.running);
        assert!(state.timer.remaining >= timeout - FAST);
    }
}
