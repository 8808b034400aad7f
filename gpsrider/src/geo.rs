//! Spherical geometry used to scatter fixes around the picked location.
//!
//! Points are drawn uniformly over the *area* of a spherical cap, not
//! uniformly over the radius, so randomized fixes do not cluster at the
//! centre.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Mean earth radius in meters
pub const EARTH_RADIUS: f64 = 6_371_009.0;

/// Largest randomization radius the companion app lets the user pick
pub const MAX_RANDOMIZE_RADIUS: f64 = 2_000.0;

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite and inside their canonical ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance to `other` in meters (haversine)
    pub fn distance_to(&self, other: &LatLng) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS * c
    }
}

/// Picks a random point within `radius_meters` of `center` using the thread rng
pub fn random_point_within_radius(center: LatLng, radius_meters: f64) -> LatLng {
    random_point_within_radius_with(&mut rand::rng(), center, radius_meters)
}

/// Picks a random point within `radius_meters` of `center`
///
/// The angular distance is `r * sqrt(u1)` and the bearing `2π * u2`; the
/// destination is found with the spherical direct formula. Longitude is
/// wrapped into `[-180, 180)` and latitude clamped into `[-90, 90]`.
pub fn random_point_within_radius_with<R: Rng + ?Sized>(
    rng: &mut R,
    center: LatLng,
    radius_meters: f64,
) -> LatLng {
    let radius_radians = radius_meters / EARTH_RADIUS;

    let lat = center.latitude.to_radians();
    let lon = center.longitude.to_radians();
    let sin_lat = lat.sin();
    let cos_lat = lat.cos();

    let u1: f64 = rng.random();
    let u2: f64 = rng.random();

    let distance = radius_radians * u1.sqrt();
    let bearing = 2.0 * PI * u2;

    let sin_distance = distance.sin();
    let cos_distance = distance.cos();

    let new_lat = (sin_lat * cos_distance + cos_lat * sin_distance * bearing.cos()).asin();
    let new_lon = lon
        + (bearing.sin() * sin_distance * cos_lat).atan2(cos_distance - sin_lat * new_lat.sin());

    let latitude = new_lat.to_degrees();
    let mut longitude = new_lon.to_degrees();

    longitude = ((longitude + 180.0) % 360.0 + 360.0) % 360.0 - 180.0;

    LatLng {
        latitude: latitude.clamp(-90.0, 90.0),
        longitude,
    }
}
