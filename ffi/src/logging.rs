use std::{
    ffi::{CStr, c_char},
    path::Path,
};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

// Keeps the file writer thread flushing for the life of the process
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initializes the logger
///
/// # Arguments
/// * [`console_level`] - The level to log to stderr
/// * [`file_level`] - The level to log to the file
/// * [`file_path`] - If not null, the file to write logs to
///
/// ## Log Level
/// 0. Disabled
/// 1. Error
/// 2. Warn
/// 3. Info
/// 4. Debug
/// 5. Trace
///
/// # Returns
/// 0 for success, -1 if the file couldn't be created, -2 if a logger has been initialized, -3 for invalid path string
///
/// # Safety
/// Pass a valid CString for file_path, or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_init_logger(
    console_level: GpsRiderLogLevel,
    file_level: GpsRiderLogLevel,
    file_path: *const c_char,
) -> GpsRiderLoggerError {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::from(console_level));

    let file = if file_path.is_null() {
        None
    } else {
        let file_path = match unsafe { CStr::from_ptr(file_path) }.to_str() {
            Ok(f) => Path::new(f),
            Err(_) => return GpsRiderLoggerError::InvalidPathString,
        };
        let (Some(dir), Some(name)) = (file_path.parent(), file_path.file_name()) else {
            return GpsRiderLoggerError::InvalidPathString;
        };
        if std::fs::create_dir_all(dir).is_err() {
            return GpsRiderLoggerError::FileError;
        }
        let appender = tracing_appender::rolling::never(dir, name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        if FILE_GUARD.set(guard).is_err() {
            return GpsRiderLoggerError::AlreadyInitialized;
        }
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(LevelFilter::from(file_level)),
        )
    };

    if tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .is_err()
    {
        GpsRiderLoggerError::AlreadyInitialized
    } else {
        GpsRiderLoggerError::Success
    }
}

#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum GpsRiderLoggerError {
    Success = 0,
    FileError = -1,
    AlreadyInitialized = -2,
    InvalidPathString = -3,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsRiderLogLevel {
    Disabled = 0,
    ErrorLevel = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<GpsRiderLogLevel> for LevelFilter {
    fn from(value: GpsRiderLogLevel) -> Self {
        match value {
            GpsRiderLogLevel::Disabled => LevelFilter::OFF,
            GpsRiderLogLevel::ErrorLevel => LevelFilter::ERROR,
            GpsRiderLogLevel::Warn => LevelFilter::WARN,
            GpsRiderLogLevel::Info => LevelFilter::INFO,
            GpsRiderLogLevel::Debug => LevelFilter::DEBUG,
            GpsRiderLogLevel::Trace => LevelFilter::TRACE,
        }
    }
}
