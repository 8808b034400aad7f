//! Entry points for the host's native hook trampolines

use std::ffi::{CStr, c_char};

use gpsrider::{
    GpsRiderError,
    hooks::{HookTable, HookTarget, HookValue, MethodHookParam},
};
use tracing::debug;

use crate::{RUNTIME, types::GpsRiderValue};

/// One intercepted call as seen by the trampoline
///
/// `class_name`, `method_name` and `param_types` identify the hooked
/// overload. `args` points at `arg_count` values that the hooks may
/// replace in place. `has_result`/`result` carry the return value.
#[repr(C)]
#[derive(Debug)]
pub struct GpsRiderCall {
    pub class_name: *const c_char,
    pub method_name: *const c_char,
    pub param_types: *const *const c_char,
    pub param_count: usize,
    pub this_value: GpsRiderValue,
    pub args: *mut GpsRiderValue,
    pub arg_count: usize,
    pub has_result: bool,
    pub result: GpsRiderValue,
}

unsafe fn c_str<'a>(s: *const c_char) -> Result<&'a str, GpsRiderError> {
    if s.is_null() {
        return Err(GpsRiderError::InvalidArgument("null string".into()));
    }
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| GpsRiderError::InvalidArgument("string is not utf-8".into()))
}

/// Finds the hooked target for `call` and reads its values
///
/// `None` when nothing is hooked on that overload.
unsafe fn read_call<'t>(
    table: &'t HookTable,
    call: &GpsRiderCall,
) -> Result<Option<(&'t HookTarget, MethodHookParam)>, GpsRiderError> {
    let class = unsafe { c_str(call.class_name)? };
    let method = unsafe { c_str(call.method_name)? };
    let mut params = Vec::with_capacity(call.param_count);
    if !call.param_types.is_null() {
        for i in 0..call.param_count {
            params.push(unsafe { c_str(*call.param_types.add(i))? });
        }
    }
    let Some(target) = table.lookup(class, method, &params) else {
        return Ok(None);
    };

    let this = unsafe { call.this_value.to_hook_value()? };
    let mut args = Vec::with_capacity(call.arg_count);
    if !call.args.is_null() {
        for i in 0..call.arg_count {
            args.push(unsafe { (*call.args.add(i)).to_hook_value()? });
        }
    }
    let mut param = MethodHookParam::new(this, args);
    if call.has_result {
        param.set_result(unsafe { call.result.to_hook_value()? });
    }
    Ok(Some((target, param)))
}

/// Writes back only what the hooks changed
unsafe fn write_back(call: &mut GpsRiderCall, before: &MethodHookParam, after: &MethodHookParam) {
    if after.this != before.this {
        call.this_value = GpsRiderValue::from_hook_value(&after.this);
    }
    if !call.args.is_null() {
        for (i, (old, new)) in before.args.iter().zip(&after.args).enumerate() {
            if old != new {
                unsafe { *call.args.add(i) = GpsRiderValue::from_hook_value(new) };
            }
        }
    }
    if after.result() != before.result() {
        match after.result() {
            Some(v) => {
                call.has_result = true;
                call.result = GpsRiderValue::from_hook_value(v);
            }
            None => {
                call.has_result = false;
                call.result = GpsRiderValue::from_hook_value(&HookValue::Null);
            }
        }
    }
}

enum Phase {
    Before,
    After,
}

unsafe fn route(call: *mut GpsRiderCall, phase: Phase) -> bool {
    if call.is_null() {
        tracing::error!("Null pointer provided");
        return false;
    }
    let Some(runtime) = RUNTIME.get() else {
        return false;
    };
    let call = unsafe { &mut *call };

    let (target, mut param) = match unsafe { read_call(&runtime.table, call) } {
        Ok(Some(found)) => found,
        Ok(None) => return call.has_result,
        Err(e) => {
            debug!("Unreadable call, passing through: {e}");
            return call.has_result;
        }
    };
    let original = param.clone();
    match phase {
        Phase::Before => {
            runtime.table.before(target, &mut param);
        }
        Phase::After => runtime.table.after(target, &mut param),
    }
    unsafe { write_back(call, &original, &param) };
    call.has_result
}

/// Runs the before-hooks for a call
///
/// # Returns
/// true if a hook set `result`, in which case the original method must not
/// be invoked and `result` returned instead
///
/// # Safety
/// `call` must point to a valid GpsRiderCall whose pointers are valid for
/// the counts given. Replaced `Str` values are allocated by this library and
/// must be freed with `gpsrider_string_free`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_dispatch_before(call: *mut GpsRiderCall) -> bool {
    unsafe { route(call, Phase::Before) }
}

/// Runs the after-hooks for a call
///
/// The trampoline sets `has_result`/`result` to the original's return value
/// before calling this.
///
/// # Returns
/// Whether `result` holds a value
///
/// # Safety
/// Same as [`gpsrider_dispatch_before`]
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_dispatch_after(call: *mut GpsRiderCall) -> bool {
    unsafe { route(call, Phase::After) }
}

#[cfg(test)]
mod tests {
    use std::{
        ffi::{CString, c_void},
        ptr,
    };

    use super::*;
    use crate::{
        GpsRiderLoadReport, gpsrider_is_armed, gpsrider_module_load,
        platform::GpsRiderPlatform,
        types::{GpsRiderFix, GpsRiderValueKind},
    };

    unsafe extern "C" fn no_invoke(
        _user_data: *mut c_void,
        _object: u64,
        _method_name: *const c_char,
        _args: *const GpsRiderValue,
        _arg_count: usize,
    ) -> i32 {
        -1
    }

    fn call(class: &CString, method: &CString, result: f64) -> GpsRiderCall {
        GpsRiderCall {
            class_name: class.as_ptr(),
            method_name: method.as_ptr(),
            param_types: ptr::null(),
            param_count: 0,
            this_value: GpsRiderValue {
                kind: GpsRiderValueKind::Object,
                object: 1,
                ..Default::default()
            },
            args: ptr::null_mut(),
            arg_count: 0,
            has_result: false,
            result: GpsRiderValue {
                double_value: result,
                ..Default::default()
            },
        }
    }

    #[test]
    fn loaded_module_answers_trampoline_calls() {
        let path = std::env::temp_dir().join(format!("gpsrider-ffi-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{"enabled":true,"center":{"latitude":51.5074,"longitude":-0.1278}}"#,
        )
        .unwrap();

        let package = CString::new("com.example").unwrap();
        let config = CString::new(path.to_str().unwrap()).unwrap();
        let platform = GpsRiderPlatform {
            user_data: ptr::null_mut(),
            resolve: None,
            invoke: Some(no_invoke),
            clear_mock_flag: None,
        };
        let mut report = GpsRiderLoadReport::default();
        let err = unsafe {
            gpsrider_module_load(package.as_ptr(), config.as_ptr(), platform, &mut report)
        };
        assert!(err.is_null());
        assert!(report.armed);
        assert_eq!(report.skipped, 0);
        assert!(gpsrider_is_armed());

        let class = CString::new("android.location.Location").unwrap();
        let method = CString::new("getLatitude").unwrap();
        let mut c = call(&class, &method, 0.0);
        assert!(unsafe { gpsrider_dispatch_before(&mut c) });
        assert_eq!(c.result.kind, GpsRiderValueKind::Double);
        assert_eq!(c.result.double_value, 51.5074);

        // unhooked methods are left alone
        let other = CString::new("getTime").unwrap();
        let mut c = call(&class, &other, 0.0);
        assert!(!unsafe { gpsrider_dispatch_before(&mut c) });

        let mut fix = GpsRiderFix::default();
        assert!(unsafe { crate::gpsrider_current_fix(&mut fix) }.is_null());
        assert_eq!(fix.longitude, -0.1278);

        let again = unsafe {
            gpsrider_module_load(package.as_ptr(), config.as_ptr(), platform, ptr::null_mut())
        };
        assert!(!again.is_null());
        unsafe { crate::gpsrider_error_free(again) };

        let _ = std::fs::remove_file(path);
    }
}
