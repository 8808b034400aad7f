//! Control commands, as sent by the companion app or the command line

use tracing::{debug, warn};

use crate::{
    GpsRiderError,
    config::{
        ACCURACY_RANGE, ConfigStore, DEFAULT_LOCATION, DEFAULT_RANDOMIZE_RADIUS,
        RANDOMIZE_RADIUS_RANGE,
    },
    geo::LatLng,
};

/// A request to change or inspect the spoofing configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    SetCustomLocation { latitude: f64, longitude: f64 },
    SetAccuracy(f64),
    /// `None` uses the default radius
    EnableRandomize { radius: Option<f64> },
    GetStatus,
    GetCurrentLocation,
}

impl Command {
    /// What the command does, for failure messages
    fn action(&self) -> &'static str {
        match self {
            Command::Start => "start fake location",
            Command::Stop => "stop fake location",
            Command::Toggle => "toggle fake location",
            Command::SetCustomLocation { .. } => "set custom location",
            Command::SetAccuracy(_) => "set accuracy",
            Command::EnableRandomize { .. } => "enable randomization",
            Command::GetStatus => "get status",
            Command::GetCurrentLocation => "get current location",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ResultCode {
    Success = 1,
    Error = 0,
    InvalidParams = -1,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub code: ResultCode,
    pub message: String,
}

impl CommandOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Success,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::Error,
            message: message.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::InvalidParams,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }
}

/// Applies commands to a configuration store
#[derive(Debug)]
pub struct CommandExecutor<S: ConfigStore> {
    store: S,
}

impl<S: ConfigStore> CommandExecutor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs `command`; invalid input is rejected before anything is written
    pub fn execute(&self, command: Command) -> CommandOutcome {
        debug!("Executing {command:?}");
        if let Err(message) = validate(&command) {
            return CommandOutcome::invalid(message);
        }
        match self.apply(command) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Command {command:?} failed: {e}");
                CommandOutcome::error(format!("Failed to {}: {e}", command.action()))
            }
        }
    }

    fn apply(&self, command: Command) -> Result<CommandOutcome, GpsRiderError> {
        Ok(match command {
            Command::Start => {
                let config = self.store.update(|c| {
                    c.center.get_or_insert(DEFAULT_LOCATION);
                    c.enabled = true;
                })?;
                let center = config.center.unwrap_or(DEFAULT_LOCATION);
                CommandOutcome::success(format!(
                    "Fake location started at: {}, {}",
                    center.latitude, center.longitude
                ))
            }
            Command::Stop => {
                self.store.update(|c| c.enabled = false)?;
                CommandOutcome::success("Fake location stopped")
            }
            Command::Toggle => {
                let config = self.store.update(|c| c.enabled = !c.enabled)?;
                if config.enabled {
                    CommandOutcome::success("Fake location started")
                } else {
                    CommandOutcome::success("Fake location stopped")
                }
            }
            Command::SetCustomLocation {
                latitude,
                longitude,
            } => {
                self.store.update(|c| {
                    c.center = Some(LatLng::new(latitude, longitude));
                    c.enabled = true;
                })?;
                CommandOutcome::success(format!(
                    "Location set to: {latitude}, {longitude} and fake location started"
                ))
            }
            Command::SetAccuracy(accuracy) => {
                self.store.update(|c| {
                    c.accuracy.enabled = true;
                    c.accuracy.value = Some(accuracy);
                })?;
                CommandOutcome::success(format!("Accuracy set to: {accuracy}"))
            }
            Command::EnableRandomize { radius } => {
                let radius = radius.unwrap_or(DEFAULT_RANDOMIZE_RADIUS);
                self.store.update(|c| {
                    c.randomize.enabled = true;
                    c.randomize.value = Some(radius);
                })?;
                CommandOutcome::success(format!("Randomization enabled with radius: {radius}"))
            }
            Command::GetStatus => {
                if self.store.load()?.enabled {
                    CommandOutcome::success("Status: active")
                } else {
                    CommandOutcome::success("Status: inactive")
                }
            }
            Command::GetCurrentLocation => match self.store.load()?.center {
                Some(c) => CommandOutcome::success(format!(
                    "Current location: {}, {}",
                    c.latitude, c.longitude
                )),
                None => CommandOutcome::error("No location set"),
            },
        })
    }
}

fn validate(command: &Command) -> Result<(), String> {
    match *command {
        Command::SetCustomLocation {
            latitude,
            longitude,
        } => {
            if !LatLng::new(latitude, longitude).is_valid() {
                return Err(format!("Invalid location: {latitude}, {longitude}"));
            }
        }
        Command::SetAccuracy(accuracy) => {
            if !ACCURACY_RANGE.contains(&accuracy) {
                return Err(format!("Invalid accuracy: {accuracy}"));
            }
        }
        Command::EnableRandomize {
            radius: Some(radius),
        } => {
            if !RANDOMIZE_RADIUS_RANGE.contains(&radius) {
                return Err(format!("Invalid radius: {radius}"));
            }
        }
        _ => {}
    }
    Ok(())
}
