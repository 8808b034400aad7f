//! Host callbacks: target lookup, calls into host objects and mock-flag masking

use std::{
    ffi::{CString, c_char, c_void},
    sync::Arc,
};

use gpsrider::{
    GpsRiderError, LocationFix,
    hooks::{HookTarget, HookValue, ObjectInvoker, TargetResolver},
    synthesizer::MockMasker,
};
use tracing::debug;

use crate::{
    gpsrider_string_free,
    types::{GpsRiderFix, GpsRiderValue},
};

/// Returns true when the class and method exist in the host runtime.
/// `param_types` is NULL with a count of 0 for "any overload".
pub type GpsRiderResolveFn = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        class_name: *const c_char,
        method_name: *const c_char,
        param_types: *const *const c_char,
        param_count: usize,
    ) -> bool,
>;

/// Calls `method_name` on `object`; returns 0 on success
pub type GpsRiderInvokeFn = Option<
    unsafe extern "C" fn(
        user_data: *mut c_void,
        object: u64,
        method_name: *const c_char,
        args: *const GpsRiderValue,
        arg_count: usize,
    ) -> i32,
>;

/// Clears the host's mock-provider indicator for `fix`; returns 0 on success.
/// The callback may update `fix.from_mock_provider` to what the host now reports.
pub type GpsRiderMaskFn =
    Option<unsafe extern "C" fn(user_data: *mut c_void, fix: *mut GpsRiderFix) -> i32>;

/// Callbacks supplied by the host at load time
///
/// `clear_mock_flag` may be NULL, in which case records are only masked
/// on the library side.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct GpsRiderPlatform {
    pub user_data: *mut c_void,
    pub resolve: GpsRiderResolveFn,
    pub invoke: GpsRiderInvokeFn,
    pub clear_mock_flag: GpsRiderMaskFn,
}

/// The host's callbacks, shared with hooks on any thread
#[derive(Debug, Clone, Copy)]
pub(crate) struct NativePlatform(GpsRiderPlatform);

// The load contract requires the callbacks and user_data to be usable from
// any thread for the life of the process.
unsafe impl Send for NativePlatform {}
unsafe impl Sync for NativePlatform {}

impl NativePlatform {
    /// # Safety
    /// See `gpsrider_module_load`
    pub(crate) unsafe fn new(platform: GpsRiderPlatform) -> Self {
        Self(platform)
    }

    /// Masking strategies the host offers, tried before the built-in one
    pub(crate) fn maskers(&self) -> Vec<Arc<dyn MockMasker>> {
        match self.0.clear_mock_flag {
            Some(_) => vec![Arc::new(*self)],
            None => Vec::new(),
        }
    }
}

impl MockMasker for NativePlatform {
    fn name(&self) -> &str {
        "host"
    }

    fn clear_mock_flag(&self, fix: &mut LocationFix) -> Result<(), GpsRiderError> {
        let Some(clear) = self.0.clear_mock_flag else {
            return Err(GpsRiderError::TargetNotFound("clear_mock_flag".into()));
        };
        let mut c_fix = GpsRiderFix::from(&*fix);
        let code = unsafe { clear(self.0.user_data, &mut c_fix) };
        if code != 0 {
            return Err(GpsRiderError::InternalError(format!(
                "host failed to clear mock flag with {code}"
            )));
        }
        fix.from_mock_provider = c_fix.from_mock_provider;
        Ok(())
    }
}

impl TargetResolver for NativePlatform {
    fn resolve(&self, target: &HookTarget) -> bool {
        let Some(resolve) = self.0.resolve else {
            return true;
        };
        let (Ok(class), Ok(method)) = (
            CString::new(target.class.as_ref()),
            CString::new(target.method.as_ref()),
        ) else {
            return false;
        };
        let params: Vec<CString> = match &target.params {
            Some(params) => match params.iter().map(|p| CString::new(p.as_ref())).collect() {
                Ok(p) => p,
                Err(_) => return false,
            },
            None => Vec::new(),
        };
        let param_ptrs: Vec<*const c_char> = params.iter().map(|p| p.as_ptr()).collect();
        let param_types = if target.params.is_some() {
            param_ptrs.as_ptr()
        } else {
            std::ptr::null()
        };

        unsafe {
            resolve(
                self.0.user_data,
                class.as_ptr(),
                method.as_ptr(),
                param_types,
                param_ptrs.len(),
            )
        }
    }
}

impl ObjectInvoker for NativePlatform {
    fn call_method(
        &self,
        object: &HookValue,
        method: &str,
        args: &[HookValue],
    ) -> Result<HookValue, GpsRiderError> {
        let Some(invoke) = self.0.invoke else {
            return Err(GpsRiderError::TargetNotFound(method.to_string()));
        };
        let HookValue::Object(handle) = object else {
            return Err(GpsRiderError::UnexpectedValue);
        };
        let method_c = CString::new(method)
            .map_err(|_| GpsRiderError::InvalidArgument(method.to_string()))?;
        let c_args: Vec<GpsRiderValue> = args.iter().map(GpsRiderValue::from_hook_value).collect();

        let code = unsafe {
            invoke(
                self.0.user_data,
                *handle,
                method_c.as_ptr(),
                c_args.as_ptr(),
                c_args.len(),
            )
        };

        // strings in the arguments were allocated for this call only
        for arg in &c_args {
            if !arg.str_value.is_null() {
                unsafe { gpsrider_string_free(arg.str_value as *mut c_char) };
            }
        }

        if code != 0 {
            debug!("Host call {method} returned {code}");
            return Err(GpsRiderError::InternalError(format!(
                "host call {method} failed with {code}"
            )));
        }
        Ok(HookValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gpsrider::{LocationState, Synthesizer};

    use super::*;

    unsafe extern "C" fn failing_mask(user_data: *mut c_void, _fix: *mut GpsRiderFix) -> i32 {
        let calls = unsafe { &*(user_data as *const AtomicUsize) };
        calls.fetch_add(1, Ordering::SeqCst);
        -1
    }

    unsafe extern "C" fn clearing_mask(user_data: *mut c_void, fix: *mut GpsRiderFix) -> i32 {
        let calls = unsafe { &*(user_data as *const AtomicUsize) };
        calls.fetch_add(1, Ordering::SeqCst);
        unsafe { (*fix).from_mock_provider = false };
        0
    }

    fn platform(calls: &AtomicUsize, mask: GpsRiderMaskFn) -> NativePlatform {
        unsafe {
            NativePlatform::new(GpsRiderPlatform {
                user_data: calls as *const AtomicUsize as *mut c_void,
                resolve: None,
                invoke: None,
                clear_mock_flag: mask,
            })
        }
    }

    fn mocked() -> LocationFix {
        let mut fix = LocationFix::new("gps");
        fix.from_mock_provider = true;
        fix
    }

    #[test]
    fn no_host_masker_without_callback() {
        let calls = AtomicUsize::new(0);
        assert!(platform(&calls, None).maskers().is_empty());
    }

    #[test]
    fn host_masker_runs_first() {
        let calls = AtomicUsize::new(0);
        let synthesizer = Synthesizer::with_maskers(platform(&calls, Some(clearing_mask)).maskers());
        let fix = synthesizer.build_fix(&LocationState::default(), Some(&mocked()), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!fix.from_mock_provider);
        assert!(fix.synthetic_flag_masked);
    }

    #[test]
    fn failing_host_masker_falls_back() {
        let calls = AtomicUsize::new(0);
        let synthesizer = Synthesizer::with_maskers(platform(&calls, Some(failing_mask)).maskers());
        let fix = synthesizer.build_fix(&LocationState::default(), Some(&mocked()), None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!fix.from_mock_provider);
        assert!(fix.synthetic_flag_masked);
    }

    #[test]
    fn resolve_defaults_to_present() {
        let calls = AtomicUsize::new(0);
        let target = HookTarget::method(
            "android.location.Location".into(),
            "getLatitude".into(),
            vec![],
        );
        assert!(platform(&calls, None).resolve(&target));
    }
}
