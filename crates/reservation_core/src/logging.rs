//! Rolling-file logging for processes that host a reservation session.
//!
//! Store events are `event=... module=... status=...` lines carrying
//! keyspace names, confirmation numbers and copy counts. Guest profile
//! fields never reach the log.
//!
//! One logger per process: the first successful `init_logging` wins, and any
//! later call must ask for the same level and directory.

use crate::config::LoggingConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::any::Any;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    level: LevelFilter,
    directory: PathBuf,
    _handle: LoggerHandle,
}

#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    Io {
        directory: PathBuf,
        source: std::io::Error,
    },
    Backend(flexi_logger::FlexiLoggerError),
    /// Logging already runs with different settings.
    Conflict { active: String, requested: String },
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected off|error|warn|info|debug|trace"
            ),
            Self::Io { directory, source } => write!(
                f,
                "cannot create log directory `{}`: {source}",
                directory.display()
            ),
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::Conflict { active, requested } => write!(
                f,
                "logging already active with {active}; refusing to switch to {requested}"
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            Self::InvalidLevel(_) | Self::Conflict { .. } => None,
        }
    }
}

/// Starts the process logger described by `config`.
///
/// Repeating the call with the same level and directory is a no-op, so every
/// `Session::open` carrying a logging section may call it.
///
/// # Errors
/// - `InvalidLevel` before anything is started.
/// - `Conflict` when a logger is already running with other settings.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let level = parse_level(&config.level)?;
    let active = ACTIVE.get_or_try_init(|| start_logger(config, level))?;

    if active.level != level || active.directory != config.directory {
        return Err(LoggingError::Conflict {
            active: describe(active.level, &active.directory),
            requested: describe(level, &config.directory),
        });
    }
    Ok(())
}

fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    LevelFilter::from_str(level.trim()).map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

fn start_logger(config: &LoggingConfig, level: LevelFilter) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&config.directory).map_err(|source| LoggingError::Io {
        directory: config.directory.clone(),
        source,
    })?;

    let handle = Logger::try_with_str(level.to_string().to_ascii_lowercase())
        .map_err(LoggingError::Backend)?
        .log_to_file(
            FileSpec::default()
                .directory(config.directory.clone())
                .basename(config.file_basename.as_str()),
        )
        .rotate(
            Criterion::Size(config.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.keep_files),
        )
        .write_mode(WriteMode::Direct)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_init module=logging status=ok level={} directory={} version={}",
        level,
        config.directory.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        directory: config.directory.clone(),
        _handle: handle,
    })
}

fn describe(level: LevelFilter, directory: &Path) -> String {
    format!("level {level} in `{}`", directory.display())
}

// Runs at most once: the logger cell only initializes once per process.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            panic_payload(info.payload())
        );
        previous(info);
    }));
}

/// Single-line, length-capped rendering of a panic payload.
fn panic_payload(payload: &(dyn Any + Send)) -> String {
    let text = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload");

    let mut flat: String = text
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .take(PANIC_PAYLOAD_LIMIT)
        .collect();
    if text.chars().count() > PANIC_PAYLOAD_LIMIT {
        flat.push_str("...");
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::{init_logging, panic_payload, parse_level, LoggingError, PANIC_PAYLOAD_LIMIT};
    use crate::config::LoggingConfig;
    use log::LevelFilter;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level(" INFO ").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("off").unwrap(), LevelFilter::Off);
    }

    #[test]
    fn unknown_level_is_rejected_before_logger_starts() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            level: "chatty".to_string(),
            directory: dir.path().join("logs"),
            ..LoggingConfig::default()
        };

        let err = init_logging(&config).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLevel(ref level) if level == "chatty"));
        assert!(!config.directory.exists());
    }

    #[test]
    fn panic_payload_is_flattened_and_capped() {
        let multiline: Box<dyn std::any::Any + Send> =
            Box::new(String::from("room 101\nguest Okafor"));
        assert_eq!(panic_payload(multiline.as_ref()), "room 101 guest Okafor");

        let long: Box<dyn std::any::Any + Send> = Box::new("x".repeat(400));
        let rendered = panic_payload(long.as_ref());
        assert_eq!(rendered.len(), PANIC_PAYLOAD_LIMIT + 3);
        assert!(rendered.ends_with("..."));

        let opaque: Box<dyn std::any::Any + Send> = Box::new(42_u32);
        assert_eq!(panic_payload(opaque.as_ref()), "non-string payload");
    }
}
