//! Process-wide "current fake location".
//!
//! Every intercepted call reads from here, usually many times per second and
//! from several threads at once. Recomputing (and re-reading configuration,
//! which may cross a process boundary) is debounced by a 200 ms staleness
//! window. Checking staleness, recomputing and publishing happen under one
//! lock, and a recompute works on a copy that is published whole, so readers
//! never observe a half-updated state.
//!
//! Optional fields use `0` to mean "not configured" and are sticky: turning
//! a toggle off leaves the last configured value in place.

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use rand::Rng;
use tracing::{debug, trace};

use crate::{
    GpsRiderError,
    config::{DEFAULT_LOCATION, SpoofConfig},
    geo::{self, LatLng},
};

/// How long a computed state is reused before it is recomputed
pub const STALENESS_WINDOW: Duration = Duration::from_millis(200);

/// Accuracy applied together with the fallback location
pub const FALLBACK_ACCURACY: f32 = 5.0;
/// Altitude applied together with the fallback location
pub const FALLBACK_ALTITUDE: f64 = 10.0;

/// The synthesized values, zero meaning "not configured"
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocationState {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
    pub altitude: f64,
    pub vertical_accuracy: f32,
    pub mean_sea_level: f64,
    pub mean_sea_level_accuracy: f32,
    pub speed: f32,
    pub speed_accuracy: f32,
}

fn set_f32(v: f32) -> Option<f32> {
    (v != 0.0).then_some(v)
}

fn set_f64(v: f64) -> Option<f64> {
    (v != 0.0).then_some(v)
}

impl LocationState {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    pub fn accuracy(&self) -> Option<f32> {
        set_f32(self.accuracy)
    }

    pub fn altitude(&self) -> Option<f64> {
        set_f64(self.altitude)
    }

    pub fn vertical_accuracy(&self) -> Option<f32> {
        set_f32(self.vertical_accuracy)
    }

    pub fn mean_sea_level(&self) -> Option<f64> {
        set_f64(self.mean_sea_level)
    }

    pub fn mean_sea_level_accuracy(&self) -> Option<f32> {
        set_f32(self.mean_sea_level_accuracy)
    }

    pub fn speed(&self) -> Option<f32> {
        set_f32(self.speed)
    }

    pub fn speed_accuracy(&self) -> Option<f32> {
        set_f32(self.speed_accuracy)
    }

    fn is_null_island(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Computes the state that follows `self` under `config`
    ///
    /// Fails without touching anything if the configured center is not a
    /// valid coordinate.
    pub fn next<R: Rng + ?Sized>(
        &self,
        config: &SpoofConfig,
        rng: &mut R,
    ) -> Result<LocationState, GpsRiderError> {
        let mut next = *self;

        let Some(center) = config.center else {
            if next.is_null_island() {
                next.latitude = DEFAULT_LOCATION.latitude;
                next.longitude = DEFAULT_LOCATION.longitude;
                next.accuracy = FALLBACK_ACCURACY;
                next.altitude = FALLBACK_ALTITUDE;
                next.speed = 0.0;
            }
            return Ok(next);
        };

        if !center.is_valid() {
            return Err(GpsRiderError::InvalidArgument(format!(
                "configured center {center:?}"
            )));
        }

        let position = match config.randomize_radius() {
            Some(radius) => geo::random_point_within_radius_with(rng, center, radius),
            None => center,
        };
        next.latitude = position.latitude;
        next.longitude = position.longitude;

        if let Some(v) = config.accuracy() {
            next.accuracy = v;
        }
        if let Some(v) = config.altitude() {
            next.altitude = v;
        }
        if let Some(v) = config.vertical_accuracy() {
            next.vertical_accuracy = v;
        }
        if let Some(v) = config.mean_sea_level() {
            next.mean_sea_level = v;
        }
        if let Some(v) = config.mean_sea_level_accuracy() {
            next.mean_sea_level_accuracy = v;
        }
        if let Some(v) = config.speed() {
            next.speed = v;
        }
        if let Some(v) = config.speed_accuracy() {
            next.speed_accuracy = v;
        }

        Ok(next)
    }
}

/// A published state and when it was computed
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CachedFix {
    pub state: LocationState,
    pub last_refreshed_at: Option<Instant>,
}

/// The shared, debounced location state of one process
#[derive(Debug)]
pub struct LocationStore {
    inner: Mutex<CachedFix>,
    window: Duration,
}

impl Default for LocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationStore {
    pub fn new() -> Self {
        Self::with_window(STALENESS_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            inner: Mutex::new(CachedFix::default()),
            window,
        }
    }

    /// The last published snapshot, without refreshing
    pub fn current_fix(&self) -> CachedFix {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Refreshes from `load` if the snapshot is older than the window
    ///
    /// `load` is only called when a refresh is due.
    pub fn refresh_if_stale<F>(&self, load: F) -> CachedFix
    where
        F: FnOnce() -> Result<SpoofConfig, GpsRiderError>,
    {
        self.refresh_if_stale_at(Instant::now(), load)
    }

    pub fn refresh_if_stale_at<F>(&self, now: Instant, load: F) -> CachedFix
    where
        F: FnOnce() -> Result<SpoofConfig, GpsRiderError>,
    {
        self.refresh_if_stale_with(now, &mut rand::rng(), load)
    }

    /// Refresh with an explicit clock reading and random source
    ///
    /// Errors from `load` or from computing the next state are logged and
    /// the refresh proceeds as if nothing were configured: a previous
    /// location stays published, and an empty cache gets the fallback
    /// location. The refresh time is recorded either way so a failing
    /// configuration read is retried at most once per window.
    pub fn refresh_if_stale_with<F, R>(&self, now: Instant, rng: &mut R, load: F) -> CachedFix
    where
        F: FnOnce() -> Result<SpoofConfig, GpsRiderError>,
        R: Rng + ?Sized,
    {
        let mut cached = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if cached
            .last_refreshed_at
            .is_some_and(|at| now.saturating_duration_since(at) <= self.window)
        {
            trace!("Location state is fresh");
            return *cached;
        }

        let next = match load().and_then(|config| cached.state.next(&config, rng)) {
            Ok(state) => Ok(state),
            Err(e) => {
                debug!("Treating location config as unset, refresh failed: {e}");
                cached.state.next(&SpoofConfig::default(), rng)
            }
        };
        match next {
            Ok(state) => {
                trace!("Published location state {state:?}");
                cached.state = state;
            }
            Err(e) => {
                debug!("Keeping previous location state: {e}");
            }
        }
        cached.last_refreshed_at = Some(now);

        *cached
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::config::Setting;

    fn london() -> SpoofConfig {
        SpoofConfig {
            enabled: true,
            center: Some(LatLng::new(51.5074, -0.1278)),
            randomize: Setting::on(100.0),
            ..Default::default()
        }
    }

    #[test]
    fn refresh_within_window_is_idempotent() {
        let store = LocationStore::new();
        let t0 = Instant::now();
        let first = store.refresh_if_stale_at(t0, || Ok(london()));
        let second = store.refresh_if_stale_at(t0 + Duration::from_millis(150), || {
            panic!("configuration must not be read inside the window")
        });
        assert_eq!(first, second);
        assert_eq!(
            first.state.latitude.to_bits(),
            second.state.latitude.to_bits()
        );
    }

    #[test]
    fn refresh_at_exact_window_reuses() {
        let store = LocationStore::new();
        let t0 = Instant::now();
        let first = store.refresh_if_stale_at(t0, || Ok(london()));
        let second = store.refresh_if_stale_at(t0 + STALENESS_WINDOW, || Ok(london()));
        assert_eq!(first, second);
    }

    #[test]
    fn refresh_after_window_recomputes() {
        let store = LocationStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let t0 = Instant::now();
        let first = store.refresh_if_stale_with(t0, &mut rng, || Ok(london()));
        let second = store.refresh_if_stale_with(
            t0 + Duration::from_millis(250),
            &mut rng,
            || Ok(london()),
        );
        assert_ne!(first.state.position(), second.state.position());
        assert_eq!(second.last_refreshed_at, Some(t0 + Duration::from_millis(250)));
        let center = LatLng::new(51.5074, -0.1278);
        assert!(center.distance_to(&second.state.position()) <= 100.0 + 1e-3);
    }

    #[test]
    fn fields_are_sticky_when_toggled_off() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut config = SpoofConfig {
            center: Some(LatLng::new(10.0, 20.0)),
            accuracy: Setting::on(7.5),
            speed: Setting::on(3.0),
            ..Default::default()
        };
        let state = LocationState::default().next(&config, &mut rng).unwrap();
        assert_eq!(state.accuracy, 7.5);
        assert_eq!(state.speed, 3.0);

        config.accuracy.enabled = false;
        config.speed.enabled = false;
        let state = state.next(&config, &mut rng).unwrap();
        assert_eq!(state.accuracy, 7.5);
        assert_eq!(state.speed, 3.0);
    }

    #[test]
    fn fallback_location_without_center() {
        let store = LocationStore::new();
        let fix = store.refresh_if_stale(|| Ok(SpoofConfig::default()));
        assert_eq!(fix.state.latitude, 40.7128);
        assert_eq!(fix.state.longitude, -74.0060);
        assert_eq!(fix.state.accuracy, 5.0);
        assert_eq!(fix.state.altitude, 10.0);
        assert_eq!(fix.state.speed, 0.0);
    }

    #[test]
    fn missing_center_keeps_previous_location() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = SpoofConfig {
            center: Some(LatLng::new(35.0, 139.0)),
            ..Default::default()
        };
        let state = LocationState::default().next(&config, &mut rng).unwrap();
        let state = state.next(&SpoofConfig::default(), &mut rng).unwrap();
        assert_eq!(state.position(), LatLng::new(35.0, 139.0));
    }

    #[test]
    fn center_without_randomize_is_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        let config = SpoofConfig {
            center: Some(LatLng::new(-22.9, -43.2)),
            ..Default::default()
        };
        let state = LocationState::default().next(&config, &mut rng).unwrap();
        assert_eq!(state.position(), LatLng::new(-22.9, -43.2));
    }

    #[test]
    fn failed_refresh_keeps_last_good_state() {
        let store = LocationStore::new();
        let t0 = Instant::now();
        let good = store.refresh_if_stale_at(t0, || Ok(london()));
        let after = store.refresh_if_stale_at(t0 + Duration::from_secs(1), || {
            Err(GpsRiderError::ConfigUnavailable)
        });
        assert_eq!(good.state, after.state);

        let invalid = SpoofConfig {
            center: Some(LatLng::new(f64::NAN, 0.0)),
            ..london()
        };
        let after = store.refresh_if_stale_at(t0 + Duration::from_secs(2), || Ok(invalid));
        assert_eq!(good.state, after.state);
        assert!(after.state.position().is_valid());
    }

    #[test]
    fn failed_first_refresh_uses_fallback_location() {
        let store = LocationStore::new();
        let fix = store.refresh_if_stale(|| Err(GpsRiderError::ConfigUnavailable));
        assert_eq!(fix.state.position(), DEFAULT_LOCATION);
        assert_eq!(fix.state.accuracy, FALLBACK_ACCURACY);
        assert_eq!(fix.state.altitude, FALLBACK_ALTITUDE);

        let store = LocationStore::new();
        let invalid = SpoofConfig {
            center: Some(LatLng::new(f64::NAN, 0.0)),
            ..london()
        };
        let fix = store.refresh_if_stale(|| Ok(invalid));
        assert_eq!(fix.state.position(), DEFAULT_LOCATION);
    }

    #[test]
    fn concurrent_readers_see_whole_snapshots() {
        // Every published state has accuracy == speed; a torn read would not.
        let store = Arc::new(LocationStore::with_window(Duration::ZERO));
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..500 {
                        let v = (i * 1000 + j + 1) as f64;
                        let config = SpoofConfig {
                            center: Some(LatLng::new(1.0, 1.0)),
                            accuracy: Setting::on(v),
                            speed: Setting::on(v),
                            ..Default::default()
                        };
                        let fix = store.refresh_if_stale(|| Ok(config));
                        assert_eq!(fix.state.accuracy, fix.state.speed);
                        let seen = store.current_fix();
                        assert_eq!(seen.state.accuracy, seen.state.speed);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    }
}
