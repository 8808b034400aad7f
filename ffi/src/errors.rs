use std::ffi::{CString, c_char};

/// Error returned across the C boundary
///
/// `code` is [`gpsrider::GpsRiderError::code`]; `message` is a readable
/// description. Both are owned by the library until passed to
/// [`gpsrider_error_free`].
#[repr(C)]
#[derive(Debug)]
pub struct GpsRiderFfiError {
    pub code: i32,
    pub message: *const c_char,
}

/// Frees a GpsRiderFfiError
///
/// # Safety
/// `err` must be a struct allocated by this library, or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_error_free(err: *mut GpsRiderFfiError) {
    if err.is_null() {
        return;
    }
    unsafe {
        if !(*err).message.is_null() {
            let _ = CString::from_raw((*err).message as *mut c_char);
        }
        let _ = Box::from_raw(err);
    }
}

/// Boxes anything convertible into a `GpsRiderError` as a C error
#[macro_export]
macro_rules! ffi_err {
    ($err:expr) => {{
        use gpsrider::GpsRiderError;
        use std::ffi::CString;
        use $crate::GpsRiderFfiError;

        let err: GpsRiderError = $err.into();
        let code = err.code();
        let raw_msg = match CString::new(err.to_string()) {
            Ok(msg) => msg.into_raw() as *const _,
            Err(_) => std::ptr::null(),
        };

        Box::into_raw(Box::new(GpsRiderFfiError {
            code,
            message: raw_msg,
        }))
    }};
}
