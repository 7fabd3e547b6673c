//! Command-line interface.
//!
//! One optional duration, a handful of flags, and you're brewing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A terminal countdown timer that rings when your coffee is ready.
///
/// Cofe counts down from the given duration (four minutes by default),
/// plays an alert when time is up, and lets you pause, reset or quit
/// from the keyboard. In raw mode it prints the remaining time line by
/// line and mirrors it to a status file for status bars.
#[derive(Parser, Debug, Clone)]
#[command(name = "cofe")]
#[command(author = "Thomas Vincent")]
#[command(version)]
#[command(about = "A terminal countdown timer with an audible alert", long_about = None)]
pub struct Args {
    /// Countdown duration
    ///
    /// Examples: 4m, 90s, 1h30m
    #[arg(value_name = "DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Raw mode - print remaining time and mirror it to the status file
    #[arg(long)]
    pub raw: bool,

    /// Status file written on every frame in raw mode
    #[arg(long, env = "COFE_STATUS_FILE")]
    pub status_file: Option<PathBuf>,

    /// Delay between the alert starting and exiting in raw mode
    #[arg(long, value_parser = parse_grace)]
    pub grace: Option<Duration>,

    /// Tick interval of the countdown
    #[arg(short = 'i', long, value_parser = parse_duration)]
    pub interval: Option<Duration>,

    /// Do not play the alert sound
    #[arg(short = 'm', long)]
    pub mute: bool,

    /// Configuration file path
    #[arg(short = 'c', long, env = "COFE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Append logs to this file
    #[arg(long, env = "COFE_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Verbose output - log state transitions
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Args {
    /// Parse command line arguments, leaving exit handling to the caller.
    pub fn try_parse_args() -> Result<Self, clap::Error> {
        Args::try_parse()
    }
}

/// Errors produced while reading a duration argument.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("duration is empty")]
    Empty,

    #[error("'{input}' is not a duration (try 4m, 90s or 1h30m): {reason}")]
    Invalid { input: String, reason: String },

    #[error("duration must be greater than zero")]
    Zero,

    #[error("duration must not exceed 100 years")]
    TooLong,
}

/// Longest span accepted anywhere a duration is read.
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Parse a human-friendly duration such as `4m`, `90s` or `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let duration = parse_grace(input)?;
    if duration.is_zero() {
        return Err(DurationError::Zero);
    }
    Ok(duration)
}

/// Like [`parse_duration`], but zero is allowed.
pub fn parse_grace(input: &str) -> Result<Duration, DurationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DurationError::Empty);
    }

    let duration = humantime::parse_duration(trimmed).map_err(|e| DurationError::Invalid {
        input: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    if duration > MAX_DURATION {
        return Err(DurationError::TooLong);
    }

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::parse_from(["cofe"]);
        assert_eq!(args.duration, None);
        assert!(!args.raw);
        assert!(!args.mute);
        assert_eq!(args.grace, None);
    }

    #[test]
    fn test_positional_duration() {
        let args = Args::parse_from(["cofe", "90s"]);
        assert_eq!(args.duration, Some(Duration::from_secs(90)));

        let args = Args::parse_from(["cofe", "--raw", "4m"]);
        assert_eq!(args.duration, Some(Duration::from_secs(240)));
        assert!(args.raw);
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let err = Args::try_parse_from(["cofe", "notaduration"]).unwrap_err();
        assert!(err.to_string().contains("notaduration"));
    }

    #[test]
    fn test_extra_positional_is_rejected() {
        assert!(Args::try_parse_from(["cofe", "1m", "2m"]).is_err());
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("4m"), Ok(Duration::from_secs(240)));
        assert_eq!(parse_duration(" 90s "), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("0s"), Err(DurationError::Zero));
        assert!(matches!(
            parse_duration("soon"),
            Err(DurationError::Invalid { .. })
        ));
    }

    #[test]
    fn test_absurd_duration_is_rejected() {
        assert_eq!(parse_duration("1000000y"), Err(DurationError::TooLong));
        assert_eq!(parse_grace("1000000y"), Err(DurationError::TooLong));
        assert!(parse_duration("99y").is_ok());

        let err = Args::try_parse_from(["cofe", "--interval", "1000000y"]).unwrap_err();
        assert!(err.to_string().contains("100 years"));
    }

    #[test]
    fn test_zero_grace_is_allowed() {
        assert_eq!(parse_grace("0s"), Ok(Duration::ZERO));
        let args = Args::parse_from(["cofe", "--grace", "0s"]);
        assert_eq!(args.grace, Some(Duration::ZERO));
        assert!(Args::try_parse_from(["cofe", "0s"]).is_err());
    }
}
