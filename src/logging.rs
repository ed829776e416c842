// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logging initialization.
//!
//! The command-line front-end owns `--loglevel`/`--logfile`; this module
//! just supplies the `tracing-subscriber` wiring it calls into, the way
//! nextest's CLI calls into a small init helper rather than each crate
//! configuring global state on its own.

use std::fmt;
use std::fs::File;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Severity threshold for engine log output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = LogLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(LogLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an unrecognized `--loglevel` value.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
#[error("unrecognized log level `{0}` (expected one of: error, warn, info, debug, trace)")]
pub struct LogLevelParseError(String);

/// Initializes the global `tracing` subscriber.
///
/// If `logfile` is given, log output goes there (appended) instead of
/// stderr. Returns an error if the log file can't be opened or a
/// subscriber has already been installed.
pub fn init_tracing(
    level: LogLevel,
    logfile: Option<&camino::Utf8Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(level.as_str())?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match logfile {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(file).try_init()?;
        }
        None => {
            builder.try_init()?;
        }
    }
    Ok(())
}
