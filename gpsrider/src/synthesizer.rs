//! Builds the location records returned to hooked callers.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use rand::Rng;
use tracing::{debug, trace};

use crate::{
    GpsRiderError,
    fix::{GPS_PROVIDER, LocationFix},
    store::LocationState,
};

/// Synthetic fixes are backdated by a random amount in this range (ms)
pub const TIME_JITTER_MS: std::ops::RangeInclusive<i64> = 100..=10_000;

/// A way of clearing the platform's mock-provider indicator on a record
///
/// The platform adapter usually knows one or more (a direct capability call,
/// a reflective fallback). They are tried in order until one succeeds.
pub trait MockMasker: Send + Sync {
    fn name(&self) -> &str;
    fn clear_mock_flag(&self, fix: &mut LocationFix) -> Result<(), GpsRiderError>;
}

/// Clears the flag on the record itself; always available, tried last
#[derive(Debug, Default, Clone, Copy)]
pub struct FieldMasker;

impl MockMasker for FieldMasker {
    fn name(&self) -> &str {
        "field"
    }

    fn clear_mock_flag(&self, fix: &mut LocationFix) -> Result<(), GpsRiderError> {
        fix.from_mock_provider = false;
        Ok(())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Turns a [`LocationState`] into complete records
pub struct Synthesizer {
    maskers: Vec<Arc<dyn MockMasker>>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.maskers.iter().map(|m| m.name()).collect();
        f.debug_struct("Synthesizer")
            .field("maskers", &names)
            .finish()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self::with_maskers(Vec::new())
    }

    /// Platform strategies run first, [`FieldMasker`] last
    pub fn with_maskers(mut maskers: Vec<Arc<dyn MockMasker>>) -> Self {
        maskers.push(Arc::new(FieldMasker));
        Self { maskers }
    }

    /// Builds a fix from `state`
    ///
    /// With an `original`, its provider, timing, bearing, accuracy and
    /// vertical accuracy carry over and only the fields the state has
    /// configured are replaced. Without one, a fresh record for `provider`
    /// (default `gps`) is backdated by a random 100 ms-10 s.
    pub fn build_fix(
        &self,
        state: &LocationState,
        original: Option<&LocationFix>,
        provider: Option<&str>,
    ) -> LocationFix {
        self.build_fix_with(&mut rand::rng(), now_millis(), state, original, provider)
    }

    pub fn build_fix_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now_ms: i64,
        state: &LocationState,
        original: Option<&LocationFix>,
        provider: Option<&str>,
    ) -> LocationFix {
        let mut fix = match original {
            Some(original) => {
                let mut fix = LocationFix::new(original.provider.clone());
                fix.time = original.time;
                fix.accuracy = original.accuracy;
                fix.bearing = original.bearing;
                fix.bearing_accuracy = original.bearing_accuracy;
                fix.elapsed_realtime_nanos = original.elapsed_realtime_nanos;
                fix.vertical_accuracy = original.vertical_accuracy;
                fix.from_mock_provider = original.from_mock_provider;
                fix
            }
            None => {
                let mut fix = LocationFix::new(provider.unwrap_or(GPS_PROVIDER));
                fix.time = now_ms - rng.random_range(TIME_JITTER_MS);
                fix
            }
        };

        fix.latitude = state.latitude;
        fix.longitude = state.longitude;

        if let Some(v) = state.accuracy() {
            fix.accuracy = Some(v);
        }
        if let Some(v) = state.altitude() {
            fix.altitude = Some(v);
        }
        if let Some(v) = state.vertical_accuracy() {
            fix.vertical_accuracy = Some(v);
        }
        if let Some(v) = state.speed() {
            fix.speed = Some(v);
        }
        if let Some(v) = state.speed_accuracy() {
            fix.speed_accuracy = Some(v);
        }
        if let Some(v) = state.mean_sea_level() {
            fix.mean_sea_level = Some(v);
        }
        if let Some(v) = state.mean_sea_level_accuracy() {
            fix.mean_sea_level_accuracy = Some(v);
        }

        self.mask_synthetic_origin(&mut fix);
        fix
    }

    /// Overwrites a record the host just constructed, in place
    pub fn stamp_constructed(&self, state: &LocationState, fix: &mut LocationFix) {
        fix.latitude = state.latitude;
        fix.longitude = state.longitude;
        if let Some(v) = state.accuracy() {
            fix.accuracy = Some(v);
        }
        fix.time = now_millis() - rand::rng().random_range(TIME_JITTER_MS);
        self.mask_synthetic_origin(fix);
    }

    /// A fresh fix with plausible random values for everything the state
    /// leaves unconfigured
    pub fn realistic_fix<R: Rng + ?Sized>(&self, rng: &mut R, state: &LocationState) -> LocationFix {
        let mut fix = LocationFix::new(GPS_PROVIDER);
        fix.time = now_millis() - rng.random_range(TIME_JITTER_MS);
        fix.latitude = state.latitude;
        fix.longitude = state.longitude;

        fix.accuracy = Some(
            state
                .accuracy()
                .unwrap_or_else(|| rng.random_range(3..=15) as f32),
        );
        fix.altitude = Some(
            state
                .altitude()
                .unwrap_or_else(|| rng.random_range(-100..100) as f64),
        );
        fix.speed = Some(
            state
                .speed()
                .unwrap_or_else(|| rng.random::<f32>() * 30.0),
        );
        fix.bearing = Some(rng.random::<f32>() * 360.0);
        fix.speed_accuracy = Some(rng.random::<f32>() * 5.0);
        fix.bearing_accuracy = Some(rng.random::<f32>() * 10.0);
        fix.vertical_accuracy = Some(rng.random::<f32>() * 10.0);

        self.mask_synthetic_origin(&mut fix);
        fix
    }

    /// Tries every masking strategy until one clears the mock flag
    ///
    /// Failures are logged and otherwise ignored; if all strategies fail the
    /// flag stays as it was.
    pub fn mask_synthetic_origin(&self, fix: &mut LocationFix) {
        for masker in &self.maskers {
            match masker.clear_mock_flag(fix) {
                Ok(()) => {
                    trace!("Mock flag cleared by {}", masker.name());
                    fix.synthetic_flag_masked = true;
                    return;
                }
                Err(e) => debug!("Masker {} failed: {e}", masker.name()),
            }
        }
    }
}

/// Latitude and longitude are finite and in range
pub fn validate(fix: &LocationFix) -> bool {
    fix.is_valid()
}
