//! Console logging for test runs.
//!
//! Many tests in one binary may each try to set up logging; only the first
//! call installs the dispatch, later calls are no-ops.

use crate::error::logger::LoggerError;

use common::ErrorLocation;

use std::io::stdout;
use std::panic::Location;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use fern::Dispatch;
use fern::colors::Color::{Blue, Green, Magenta, Red, Yellow};
use fern::colors::ColoredLevelConfig;
use humantime::format_rfc3339_millis;
use log::{LevelFilter, debug, info};

static INIT_LOGGER_ONCE: Once = Once::new();

static LOGGER_ALREADY_CALLED: AtomicBool = AtomicBool::new(false);

/// Default level for debug builds.
#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// Default level for release builds.
#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

/// Install a colored stdout logger at `level`.
///
/// Safe to call from every test: only the first call installs the logger.
///
/// # Errors
///
/// Returns [`LoggerError::Initialization`] if another global logger was
/// already installed by someone else.
pub fn initialize(level: LevelFilter) -> Result<(), LoggerError> {
    if LOGGER_ALREADY_CALLED.swap(true, Ordering::SeqCst) {
        debug!("Logger already initialized");
        return Ok(());
    }

    let mut result = Ok(());

    INIT_LOGGER_ONCE.call_once(|| {
        result = initialize_internal(level);
        if result.is_ok() {
            info!("Logger initialized with level: {level:?}");
        }
    });

    result
}

#[track_caller]
fn initialize_internal(level: LevelFilter) -> Result<(), LoggerError> {
    let color_configuration = ColoredLevelConfig::new()
        .debug(Blue)
        .info(Green)
        .warn(Yellow)
        .error(Red)
        .trace(Magenta);

    Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{date} - {level} - {target}] {message}",
                date = format_rfc3339_millis(SystemTime::now()),
                level = color_configuration.color(record.level()),
                target = record.target(),
                message = message,
            ))
        })
        .chain(stdout())
        .apply()
        .map_err(|e| LoggerError::Initialization {
            message: format!("Failed to initialize logger: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
}
