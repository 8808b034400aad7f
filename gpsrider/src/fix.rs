//! The location record handed to hooked callers.

use serde::{Deserialize, Serialize};

use crate::geo::LatLng;

/// Provider name used when a caller does not supply one
pub const GPS_PROVIDER: &str = "gps";
/// Network provider name, reported as enabled alongside [`GPS_PROVIDER`]
pub const NETWORK_PROVIDER: &str = "network";

/// A single location record as the platform exposes it
///
/// Optional platform fields are `None` when the record does not carry them
/// (the platform's `hasAltitude()` and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub provider: String,
    /// Wall clock time in milliseconds since the unix epoch
    pub time: i64,
    pub elapsed_realtime_nanos: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f32>,
    pub altitude: Option<f64>,
    pub vertical_accuracy: Option<f32>,
    pub mean_sea_level: Option<f64>,
    pub mean_sea_level_accuracy: Option<f32>,
    pub speed: Option<f32>,
    pub speed_accuracy: Option<f32>,
    pub bearing: Option<f32>,
    pub bearing_accuracy: Option<f32>,
    /// The platform's "this fix came from a mock provider" indicator
    pub from_mock_provider: bool,
    /// Set once a masking strategy managed to clear `from_mock_provider`
    pub synthetic_flag_masked: bool,
}

impl LocationFix {
    /// An empty record for `provider`, all optional fields unset
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            time: 0,
            elapsed_realtime_nanos: 0,
            latitude: 0.0,
            longitude: 0.0,
            accuracy: None,
            altitude: None,
            vertical_accuracy: None,
            mean_sea_level: None,
            mean_sea_level_accuracy: None,
            speed: None,
            speed_accuracy: None,
            bearing: None,
            bearing_accuracy: None,
            from_mock_provider: false,
            synthetic_flag_masked: false,
        }
    }

    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    /// Latitude and longitude are finite and inside their canonical ranges
    pub fn is_valid(&self) -> bool {
        self.position().is_valid()
    }
}

impl Default for LocationFix {
    fn default() -> Self {
        Self::new(GPS_PROVIDER)
    }
}
