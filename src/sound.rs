//! Alert playback with rodio.
//!
//! Playback runs on its own thread, which owns the output stream for the
//! lifetime of one alert. Stopping joins that thread, so the audio device is
//! released by the time [`SoundController::stop`] returns.

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, StreamError};
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// The alert clip, embedded at compile time.
pub const ALERT_CLIP: &[u8] = include_bytes!("../assets/timer_done.wav");

/// Errors that can occur while playing the alert.
#[derive(Debug, Error)]
pub enum SoundError {
    #[error("failed to decode alert clip: {0}")]
    Decode(String),

    #[error("no audio output device available: {0}")]
    DeviceNotAvailable(String),

    #[error("failed to open audio stream: {0}")]
    Stream(String),

    #[error("an alert is already playing")]
    Busy,

    #[error("sound worker failed: {0}")]
    Worker(String),
}

/// Decode a WAV clip into a playable source.
pub fn decode_clip(bytes: &'static [u8]) -> Result<Decoder<Cursor<&'static [u8]>>, SoundError> {
    Decoder::new(Cursor::new(bytes)).map_err(|e| SoundError::Decode(e.to_string()))
}

/// Opens the audio output for one playback.
pub type OutputOpener = fn() -> Result<(OutputStream, OutputStreamHandle), StreamError>;

/// A running alert.
pub struct PlaybackHandle {
    sink: Arc<Sink>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Halt output and wait for the worker to drop the stream. The worker
    /// exits as soon as the stopped sink wakes `sleep_until_end`.
    fn retire(mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.sink.stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("sound worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

/// Plays the embedded alert, at most one at a time.
#[derive(Debug)]
pub struct SoundController {
    clip: &'static [u8],
    muted: bool,
    open_output: OutputOpener,
    active: Option<PlaybackHandle>,
}

impl SoundController {
    /// Create a controller for the embedded clip.
    ///
    /// The clip is decoded once up front; a clip that does not decode is a
    /// broken build, not something to discover when the timer runs out.
    pub fn new(muted: bool) -> Result<Self, SoundError> {
        Self::with_clip(ALERT_CLIP, muted)
    }

    pub fn with_clip(clip: &'static [u8], muted: bool) -> Result<Self, SoundError> {
        decode_clip(clip)?;
        Ok(Self {
            clip,
            muted,
            open_output: OutputStream::try_default,
            active: None,
        })
    }

    /// Use `open` instead of the default output device.
    #[cfg(test)]
    pub fn with_output(mut self, open: OutputOpener) -> Self {
        self.open_output = open;
        self
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.active.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Start playing the alert in the background.
    ///
    /// `on_finish` runs once when the clip plays to the end. It does not run
    /// if the playback is stopped or fails to start; the caller owns the
    /// completion signal in that case. When muted, it runs immediately.
    pub async fn play_async<F>(&mut self, on_finish: F) -> Result<(), SoundError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.muted {
            debug!("sound muted, completing immediately");
            on_finish();
            return Ok(());
        }

        self.reap();
        if self.active.is_some() {
            return Err(SoundError::Busy);
        }

        let source = decode_clip(self.clip)?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let flag = Arc::clone(&cancelled);
        let open_output = self.open_output;
        let worker = thread::Builder::new()
            .name("cofe-sound".to_string())
            .spawn(move || {
                let (stream, handle) = match open_output() {
                    Ok(pair) => pair,
                    Err(e) => {
                        let _ = ready_tx.send(Err(SoundError::DeviceNotAvailable(e.to_string())));
                        return;
                    }
                };
                let sink = match Sink::try_new(&handle) {
                    Ok(sink) => Arc::new(sink),
                    Err(e) => {
                        let _ = ready_tx.send(Err(SoundError::Stream(e.to_string())));
                        return;
                    }
                };

                sink.append(source);
                if ready_tx.send(Ok(Arc::clone(&sink))).is_err() {
                    return;
                }

                sink.sleep_until_end();
                drop(sink);
                drop(stream);

                if !flag.load(Ordering::SeqCst) {
                    on_finish();
                }
            })
            .map_err(|e| SoundError::Worker(e.to_string()))?;

        let started = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err(SoundError::Worker("worker exited before playback".to_string())),
        };

        match started {
            Ok(sink) => {
                debug!("alert playback started");
                self.active = Some(PlaybackHandle {
                    sink,
                    cancelled,
                    worker: Some(worker),
                });
                Ok(())
            }
            Err(e) => {
                let _ = worker.join();
                Err(e)
            }
        }
    }

    /// Stop the alert and release the device. Does nothing when idle.
    pub fn stop(&mut self) {
        if let Some(playback) = self.active.take() {
            debug!("stopping alert playback");
            playback.retire();
        }
    }

    /// Like [`stop`](Self::stop), but waits for the worker on the blocking
    /// pool so the async loop is not held up.
    pub async fn stop_async(&mut self) {
        if let Some(playback) = self.active.take() {
            debug!("stopping alert playback");
            if let Err(e) = tokio::task::spawn_blocking(move || playback.retire()).await {
                warn!("failed to retire sound worker: {e}");
            }
        }
    }

    /// Retire a playback that already finished on its own.
    pub fn reap(&mut self) {
        if self.active.as_ref().is_some_and(PlaybackHandle::is_finished) {
            self.stop();
        }
    }
}

impl Drop for SoundController {
    fn drop(&mut self) {
        self.stop();
    }
}
