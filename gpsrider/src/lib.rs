//! Runtime location spoofing core.
//!
//! The crate is split the same way the work flows at runtime:
//!
//! * [`geo`] computes randomized points inside a disc on the sphere
//! * [`store`] keeps the process-wide, debounced "current fake location"
//! * [`synthesizer`] turns that state into complete [`LocationFix`] records
//! * [`hooks`] installs interceptors through an abstract [`hooks::HookRegistry`]
//!   and decides, per call, whether to override
//!
//! Configuration is read through [`config::ConfigSource`] and written only by
//! the [`command`] surface, which normally lives in a separate process.

pub mod command;
pub mod config;
pub mod context;
pub mod fix;
pub mod geo;
pub mod hooks;
mod obfuscation;
pub mod store;
pub mod synthesizer;

pub use command::{Command, CommandExecutor, CommandOutcome, ResultCode};
pub use config::{ConfigSource, ConfigStore, FileConfig, MemoryConfig, Setting, SpoofConfig};
pub use context::SpoofContext;
pub use fix::LocationFix;
pub use geo::LatLng;
pub use hooks::{GpsRiderModule, HookState, HookTable, InstallReport};
pub use store::{LocationState, LocationStore};
pub use synthesizer::Synthesizer;

use std::io;

use thiserror::Error;

/// Package name of the companion app. Its process is never hooked.
pub const MANAGER_PACKAGE: &str = "io.gpsrider.manager";

/// Package name the platform reports for the system server process.
pub const SYSTEM_SERVER_PACKAGE: &str = "android";

/// Error type for every fallible operation in the core
///
/// None of these ever reach a hooked call site; the hook table turns them into
/// pass-through behaviour. They are visible through the command surface and
/// the FFI layer only.
#[derive(Error, Debug)]
#[repr(i32)]
#[non_exhaustive]
pub enum GpsRiderError {
    #[error("preferences io failed")]
    Io(#[from] io::Error) = -1,
    #[error("preferences document is not valid json")]
    Json(#[from] serde_json::Error) = -2,
    #[error("hook target not found: {0}")]
    TargetNotFound(String) = -3,
    #[error("mock provider flag could not be cleared")]
    MaskUnavailable = -4,
    #[error("invalid argument: {0}")]
    InvalidArgument(String) = -5,
    #[error("configuration unavailable")]
    ConfigUnavailable = -6,
    #[error("unexpected value in hooked call")]
    UnexpectedValue = -7,
    #[error("hook panicked")]
    HookPanicked = -8,
    #[error("internal error: {0}")]
    InternalError(String) = -9,
}

impl GpsRiderError {
    /// Stable numeric code, used across the FFI boundary
    pub fn code(&self) -> i32 {
        match self {
            GpsRiderError::Io(_) => -1,
            GpsRiderError::Json(_) => -2,
            GpsRiderError::TargetNotFound(_) => -3,
            GpsRiderError::MaskUnavailable => -4,
            GpsRiderError::InvalidArgument(_) => -5,
            GpsRiderError::ConfigUnavailable => -6,
            GpsRiderError::UnexpectedValue => -7,
            GpsRiderError::HookPanicked => -8,
            GpsRiderError::InternalError(_) => -9,
        }
    }
}
