//! C mirrors of the core's value types

use std::ffi::{CStr, CString, c_char};

use gpsrider::{GpsRiderError, LocationFix, hooks::HookValue};

/// Provider names longer than this minus one are truncated
pub const GPSRIDER_PROVIDER_LEN: usize = 32;

/// A location record; `has_*` flags mark which optional fields are set
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpsRiderFix {
    pub provider: [c_char; GPSRIDER_PROVIDER_LEN],
    pub time_ms: i64,
    pub elapsed_realtime_nanos: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub has_accuracy: bool,
    pub accuracy: f32,
    pub has_altitude: bool,
    pub altitude: f64,
    pub has_vertical_accuracy: bool,
    pub vertical_accuracy: f32,
    pub has_mean_sea_level: bool,
    pub mean_sea_level: f64,
    pub has_mean_sea_level_accuracy: bool,
    pub mean_sea_level_accuracy: f32,
    pub has_speed: bool,
    pub speed: f32,
    pub has_speed_accuracy: bool,
    pub speed_accuracy: f32,
    pub has_bearing: bool,
    pub bearing: f32,
    pub has_bearing_accuracy: bool,
    pub bearing_accuracy: f32,
    pub from_mock_provider: bool,
    pub synthetic_flag_masked: bool,
}

impl Default for GpsRiderFix {
    fn default() -> Self {
        Self::from(&LocationFix::default())
    }
}

fn split<T: Copy + Default>(v: Option<T>) -> (bool, T) {
    (v.is_some(), v.unwrap_or_default())
}

fn join<T>(has: bool, v: T) -> Option<T> {
    has.then_some(v)
}

impl From<&LocationFix> for GpsRiderFix {
    fn from(fix: &LocationFix) -> Self {
        let mut provider = [0 as c_char; GPSRIDER_PROVIDER_LEN];
        for (dst, src) in provider
            .iter_mut()
            .zip(fix.provider.bytes().take(GPSRIDER_PROVIDER_LEN - 1))
        {
            *dst = src as c_char;
        }
        let (has_accuracy, accuracy) = split(fix.accuracy);
        let (has_altitude, altitude) = split(fix.altitude);
        let (has_vertical_accuracy, vertical_accuracy) = split(fix.vertical_accuracy);
        let (has_mean_sea_level, mean_sea_level) = split(fix.mean_sea_level);
        let (has_mean_sea_level_accuracy, mean_sea_level_accuracy) =
            split(fix.mean_sea_level_accuracy);
        let (has_speed, speed) = split(fix.speed);
        let (has_speed_accuracy, speed_accuracy) = split(fix.speed_accuracy);
        let (has_bearing, bearing) = split(fix.bearing);
        let (has_bearing_accuracy, bearing_accuracy) = split(fix.bearing_accuracy);
        Self {
            provider,
            time_ms: fix.time,
            elapsed_realtime_nanos: fix.elapsed_realtime_nanos,
            latitude: fix.latitude,
            longitude: fix.longitude,
            has_accuracy,
            accuracy,
            has_altitude,
            altitude,
            has_vertical_accuracy,
            vertical_accuracy,
            has_mean_sea_level,
            mean_sea_level,
            has_mean_sea_level_accuracy,
            mean_sea_level_accuracy,
            has_speed,
            speed,
            has_speed_accuracy,
            speed_accuracy,
            has_bearing,
            bearing,
            has_bearing_accuracy,
            bearing_accuracy,
            from_mock_provider: fix.from_mock_provider,
            synthetic_flag_masked: fix.synthetic_flag_masked,
        }
    }
}

impl From<&GpsRiderFix> for LocationFix {
    fn from(c: &GpsRiderFix) -> Self {
        let len = c.provider.iter().position(|&b| b == 0).unwrap_or(c.provider.len());
        let bytes: Vec<u8> = c.provider[..len].iter().map(|&b| b as u8).collect();
        let mut fix = LocationFix::new(String::from_utf8_lossy(&bytes).into_owned());
        fix.time = c.time_ms;
        fix.elapsed_realtime_nanos = c.elapsed_realtime_nanos;
        fix.latitude = c.latitude;
        fix.longitude = c.longitude;
        fix.accuracy = join(c.has_accuracy, c.accuracy);
        fix.altitude = join(c.has_altitude, c.altitude);
        fix.vertical_accuracy = join(c.has_vertical_accuracy, c.vertical_accuracy);
        fix.mean_sea_level = join(c.has_mean_sea_level, c.mean_sea_level);
        fix.mean_sea_level_accuracy = join(c.has_mean_sea_level_accuracy, c.mean_sea_level_accuracy);
        fix.speed = join(c.has_speed, c.speed);
        fix.speed_accuracy = join(c.has_speed_accuracy, c.speed_accuracy);
        fix.bearing = join(c.has_bearing, c.bearing);
        fix.bearing_accuracy = join(c.has_bearing_accuracy, c.bearing_accuracy);
        fix.from_mock_provider = c.from_mock_provider;
        fix.synthetic_flag_masked = c.synthetic_flag_masked;
        fix
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpsRiderValueKind {
    Null = 0,
    Bool = 1,
    Int = 2,
    Float = 3,
    Double = 4,
    Str = 5,
    Location = 6,
    Object = 7,
}

/// A tagged value; only the field matching `kind` is meaningful
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpsRiderValue {
    pub kind: GpsRiderValueKind,
    pub bool_value: bool,
    pub int_value: i64,
    pub float_value: f32,
    pub double_value: f64,
    pub str_value: *const c_char,
    pub location: GpsRiderFix,
    pub object: u64,
}

impl Default for GpsRiderValue {
    fn default() -> Self {
        Self {
            kind: GpsRiderValueKind::Null,
            bool_value: false,
            int_value: 0,
            float_value: 0.0,
            double_value: 0.0,
            str_value: std::ptr::null(),
            location: GpsRiderFix::default(),
            object: 0,
        }
    }
}

impl GpsRiderValue {
    /// Reads a caller-provided value
    ///
    /// # Safety
    /// `str_value` must be NULL or a valid C string when `kind` is `Str`
    pub unsafe fn to_hook_value(&self) -> Result<HookValue, GpsRiderError> {
        Ok(match self.kind {
            GpsRiderValueKind::Null => HookValue::Null,
            GpsRiderValueKind::Bool => HookValue::Bool(self.bool_value),
            GpsRiderValueKind::Int => HookValue::Int(self.int_value),
            GpsRiderValueKind::Float => HookValue::Float(self.float_value),
            GpsRiderValueKind::Double => HookValue::Double(self.double_value),
            GpsRiderValueKind::Str => {
                if self.str_value.is_null() {
                    HookValue::Null
                } else {
                    let s = unsafe { CStr::from_ptr(self.str_value) }
                        .to_str()
                        .map_err(|_| GpsRiderError::InvalidArgument("string is not utf-8".into()))?;
                    HookValue::Str(s.into())
                }
            }
            GpsRiderValueKind::Location => LocationFix::from(&self.location).into(),
            GpsRiderValueKind::Object => HookValue::Object(self.object),
        })
    }

    /// Builds a value to hand back; strings are allocated here and must be
    /// released with `gpsrider_string_free`
    pub fn from_hook_value(value: &HookValue) -> Self {
        let mut out = Self::default();
        match value {
            HookValue::Null => {}
            HookValue::Bool(b) => {
                out.kind = GpsRiderValueKind::Bool;
                out.bool_value = *b;
            }
            HookValue::Int(i) => {
                out.kind = GpsRiderValueKind::Int;
                out.int_value = *i;
            }
            HookValue::Float(f) => {
                out.kind = GpsRiderValueKind::Float;
                out.float_value = *f;
            }
            HookValue::Double(d) => {
                out.kind = GpsRiderValueKind::Double;
                out.double_value = *d;
            }
            HookValue::Str(s) => {
                // interior NULs cannot cross, hand back null instead
                if let Ok(s) = CString::new(&**s) {
                    out.kind = GpsRiderValueKind::Str;
                    out.str_value = s.into_raw();
                }
            }
            HookValue::Location(fix) => {
                out.kind = GpsRiderValueKind::Location;
                out.location = GpsRiderFix::from(&**fix);
            }
            HookValue::Object(o) => {
                out.kind = GpsRiderValueKind::Object;
                out.object = *o;
            }
        }
        out
    }
}
