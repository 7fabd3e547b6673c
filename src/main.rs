//! Cofe - a terminal countdown timer that rings when your coffee is ready.

mod app;
mod cli;
mod clock;
mod config;
mod keymap;
mod runtime;
mod sound;
mod ui;

use anyhow::{Context, Result};
use app::AppState;
use cli::Args;
use config::{Config, Settings};
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use runtime::{Mode, Runtime};
use sound::SoundController;
use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{debug, info};
use ui::{RawPresenter, TuiPresenter};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = match Args::try_parse_args() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = init_tracing(&args) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    // Load configuration
    let config = if let Some(ref path) = args.config {
        match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {e:#}");
                eprintln!();
                eprintln!("Sample config:");
                eprintln!("{}", config::sample_config());
                return ExitCode::FAILURE;
            }
        }
    } else {
        Config::load_or_default()
    };

    match run(&args, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the tracing subscriber for logging.
///
/// The alternate screen owns the terminal in interactive mode, so logs go
/// to `--log-file` when given and nowhere otherwise. Raw mode keeps stdout
/// for the countdown and logs to stderr.
fn init_tracing(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt};

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt().with_env_filter(filter).with_target(false);

    match (&args.log_file, args.raw) {
        (Some(path), _) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            subscriber.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        (None, true) => subscriber.without_time().with_writer(io::stderr).init(),
        (None, false) => subscriber.with_writer(io::sink).init(),
    }

    Ok(())
}

/// Resolve settings and run in the selected mode.
async fn run(args: &Args, config: &Config) -> Result<()> {
    let settings = Settings::resolve(args, config)?;
    debug!(?settings, "resolved settings");

    let sound = SoundController::new(settings.muted).context("Embedded alert clip is unusable")?;
    info!(muted = sound.is_muted(), "alert ready");

    let state = AppState::new(Some(settings.timeout), settings.raw);

    if settings.raw {
        run_raw(state, &settings, sound).await
    } else {
        run_interactive(state, &settings, sound).await
    }
}

/// Run in raw mode (line output plus status file).
async fn run_raw(state: AppState, settings: &Settings, sound: SoundController) -> Result<()> {
    let mode = Mode::Raw {
        grace: settings.grace_period,
    };
    let mut runtime = Runtime::new(settings.tick_interval, sound, mode);
    runtime.spawn_interrupt_handler();

    let mut presenter = RawPresenter::new(io::stdout(), settings.status_file.clone());
    runtime::run(state, &mut runtime, &mut presenter).await?;

    Ok(())
}

/// Run in interactive mode with TUI.
async fn run_interactive(state: AppState, settings: &Settings, sound: SoundController) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to enter alternate screen");
    }
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    let mut presenter = TuiPresenter::new(terminal);

    let mut runtime = Runtime::new(settings.tick_interval, sound, Mode::Interactive);
    runtime.spawn_terminal_input();

    // Main loop
    let result = runtime::run(state, &mut runtime, &mut presenter).await;

    // Restore terminal
    let terminal = presenter.terminal_mut();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result.map(|_| ())
}
