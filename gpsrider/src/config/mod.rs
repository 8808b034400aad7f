//! Spoofing configuration as written by the companion app.
//!
//! The core only ever reads it. Every field carries a serde default so a
//! missing or partially written document reads as "not configured".

mod file;

pub use file::FileConfig;

use std::{
    ops::RangeInclusive,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};

use crate::{GpsRiderError, geo::LatLng};

pub const DEFAULT_ACCURACY: f64 = 1.5;
pub const DEFAULT_ALTITUDE: f64 = 0.0;
pub const DEFAULT_VERTICAL_ACCURACY: f64 = 0.0;
pub const DEFAULT_MEAN_SEA_LEVEL: f64 = 0.0;
pub const DEFAULT_MEAN_SEA_LEVEL_ACCURACY: f64 = 0.0;
pub const DEFAULT_SPEED: f64 = 0.0;
pub const DEFAULT_SPEED_ACCURACY: f64 = 0.0;
pub const DEFAULT_RANDOMIZE_RADIUS: f64 = 100.0;

/// Location used when the user starts spoofing without ever picking one
pub const DEFAULT_LOCATION: LatLng = LatLng::new(40.7128, -74.0060);

pub const RANDOMIZE_RADIUS_RANGE: RangeInclusive<f64> = 0.0..=2_000.0;
pub const ACCURACY_RANGE: RangeInclusive<f64> = 0.0..=100.0;
pub const VERTICAL_ACCURACY_RANGE: RangeInclusive<f64> = 0.0..=100.0;
pub const ALTITUDE_RANGE: RangeInclusive<f64> = 0.0..=2_000.0;
pub const MEAN_SEA_LEVEL_RANGE: RangeInclusive<f64> = -400.0..=2_000.0;
pub const MEAN_SEA_LEVEL_ACCURACY_RANGE: RangeInclusive<f64> = 0.0..=100.0;
pub const SPEED_RANGE: RangeInclusive<f64> = 0.0..=30.0;
pub const SPEED_ACCURACY_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// A "use custom X" toggle together with its value
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Setting<T> {
    pub enabled: bool,
    pub value: Option<T>,
}

impl<T: Copy> Setting<T> {
    pub fn on(value: T) -> Self {
        Self {
            enabled: true,
            value: Some(value),
        }
    }

    /// The value to apply, `default` when enabled without a stored value,
    /// `None` when the toggle is off
    pub fn effective(&self, default: T) -> Option<T> {
        if self.enabled {
            Some(self.value.unwrap_or(default))
        } else {
            None
        }
    }
}

/// Everything the companion app lets the user tune
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoofConfig {
    /// Global kill switch, checked on every intercepted call
    pub enabled: bool,
    /// Also hook the location service inside the system server
    pub hook_system_services: bool,
    /// The location last picked on the map
    pub center: Option<LatLng>,
    /// Randomize within this radius in meters
    pub randomize: Setting<f64>,
    pub accuracy: Setting<f64>,
    pub altitude: Setting<f64>,
    pub vertical_accuracy: Setting<f64>,
    pub mean_sea_level: Setting<f64>,
    pub mean_sea_level_accuracy: Setting<f64>,
    pub speed: Setting<f64>,
    pub speed_accuracy: Setting<f64>,
}

impl Default for SpoofConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            hook_system_services: true,
            center: None,
            randomize: Setting::default(),
            accuracy: Setting::default(),
            altitude: Setting::default(),
            vertical_accuracy: Setting::default(),
            mean_sea_level: Setting::default(),
            mean_sea_level_accuracy: Setting::default(),
            speed: Setting::default(),
            speed_accuracy: Setting::default(),
        }
    }
}

impl SpoofConfig {
    /// Randomization radius when randomizing is on
    ///
    /// Values outside 0-2000 m are clamped, non-finite values fall back to
    /// the default radius.
    pub fn randomize_radius(&self) -> Option<f64> {
        self.randomize
            .effective(DEFAULT_RANDOMIZE_RADIUS)
            .map(|r| {
                if r.is_finite() {
                    r.clamp(*RANDOMIZE_RADIUS_RANGE.start(), *RANDOMIZE_RADIUS_RANGE.end())
                } else {
                    DEFAULT_RANDOMIZE_RADIUS
                }
            })
    }

    pub fn accuracy(&self) -> Option<f32> {
        self.accuracy.effective(DEFAULT_ACCURACY).map(|v| v as f32)
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude.effective(DEFAULT_ALTITUDE)
    }

    pub fn vertical_accuracy(&self) -> Option<f32> {
        self.vertical_accuracy
            .effective(DEFAULT_VERTICAL_ACCURACY)
            .map(|v| v as f32)
    }

    pub fn mean_sea_level(&self) -> Option<f64> {
        self.mean_sea_level.effective(DEFAULT_MEAN_SEA_LEVEL)
    }

    pub fn mean_sea_level_accuracy(&self) -> Option<f32> {
        self.mean_sea_level_accuracy
            .effective(DEFAULT_MEAN_SEA_LEVEL_ACCURACY)
            .map(|v| v as f32)
    }

    pub fn speed(&self) -> Option<f32> {
        self.speed.effective(DEFAULT_SPEED).map(|v| v as f32)
    }

    pub fn speed_accuracy(&self) -> Option<f32> {
        self.speed_accuracy
            .effective(DEFAULT_SPEED_ACCURACY)
            .map(|v| v as f32)
    }
}

/// Read side of the configuration, shared by every hook in a process
pub trait ConfigSource: Send + Sync {
    /// Reads the whole configuration
    ///
    /// This may cost cross-process IO; callers gate it behind the store's
    /// staleness window.
    fn load(&self) -> Result<SpoofConfig, GpsRiderError>;

    /// The kill switch. Unreadable configuration counts as disabled.
    fn is_enabled(&self) -> bool {
        self.load().map(|c| c.enabled).unwrap_or(false)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for Arc<T> {
    fn load(&self) -> Result<SpoofConfig, GpsRiderError> {
        (**self).load()
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}

/// Write side of the configuration, used by the command surface
pub trait ConfigStore: ConfigSource {
    fn save(&self, config: &SpoofConfig) -> Result<(), GpsRiderError>;

    /// Loads, applies `f` and saves, returning the saved configuration
    fn update<F>(&self, f: F) -> Result<SpoofConfig, GpsRiderError>
    where
        F: FnOnce(&mut SpoofConfig),
        Self: Sized,
    {
        let mut config = self.load()?;
        f(&mut config);
        self.save(&config)?;
        Ok(config)
    }
}

/// In-process configuration, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    inner: Arc<RwLock<SpoofConfig>>,
}

impl MemoryConfig {
    pub fn new(config: SpoofConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Replaces the configuration in place
    pub fn set(&self, config: SpoofConfig) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Mutates the configuration in place
    pub fn modify(&self, f: impl FnOnce(&mut SpoofConfig)) {
        f(&mut self.inner.write().unwrap_or_else(PoisonError::into_inner));
    }
}

impl ConfigSource for MemoryConfig {
    fn load(&self) -> Result<SpoofConfig, GpsRiderError> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn is_enabled(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }
}

impl ConfigStore for MemoryConfig {
    fn save(&self, config: &SpoofConfig) -> Result<(), GpsRiderError> {
        self.set(config.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_not_configured() {
        let config: SpoofConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SpoofConfig::default());
        assert!(!config.enabled);
        assert!(config.center.is_none());
        assert!(config.accuracy().is_none());
        assert!(config.randomize_radius().is_none());
    }

    #[test]
    fn enabled_setting_without_value_uses_default() {
        let config: SpoofConfig =
            serde_json::from_str(r#"{"accuracy":{"enabled":true},"randomize":{"enabled":true}}"#)
                .unwrap();
        assert_eq!(config.accuracy(), Some(DEFAULT_ACCURACY as f32));
        assert_eq!(config.randomize_radius(), Some(DEFAULT_RANDOMIZE_RADIUS));
    }

    #[test]
    fn disabled_setting_hides_value() {
        let mut config = SpoofConfig::default();
        config.speed = Setting {
            enabled: false,
            value: Some(12.0),
        };
        assert_eq!(config.speed(), None);
        config.speed.enabled = true;
        assert_eq!(config.speed(), Some(12.0));
    }

    #[test]
    fn randomize_radius_is_clamped() {
        let mut config = SpoofConfig::default();
        config.randomize = Setting::on(5_000.0);
        assert_eq!(config.randomize_radius(), Some(2_000.0));
        config.randomize = Setting::on(-3.0);
        assert_eq!(config.randomize_radius(), Some(0.0));
        config.randomize = Setting::on(f64::NAN);
        assert_eq!(config.randomize_radius(), Some(DEFAULT_RANDOMIZE_RADIUS));
    }

    #[test]
    fn memory_config_update() {
        let config = MemoryConfig::default();
        let saved = config
            .update(|c| {
                c.enabled = true;
                c.center = Some(LatLng::new(1.0, 2.0));
            })
            .unwrap();
        assert!(saved.enabled);
        assert!(config.is_enabled());
        assert_eq!(config.load().unwrap().center, Some(LatLng::new(1.0, 2.0)));
    }
}
