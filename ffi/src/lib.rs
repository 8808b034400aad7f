//! C bindings for embedding gpsrider into a host's instrumentation runtime
//!
//! The host calls [`gpsrider_module_load`] once per process, then routes
//! every hooked call through [`dispatch::gpsrider_dispatch_before`] and
//! [`dispatch::gpsrider_dispatch_after`].

pub mod dispatch;
mod errors;
pub mod logging;
pub mod platform;
pub mod types;

pub use errors::*;

use std::{
    ffi::{CStr, CString, c_char},
    sync::Arc,
};

use gpsrider::{
    FileConfig, GpsRiderError, GpsRiderModule, HookState, HookTable, LocationStore, SpoofContext,
    Synthesizer,
    hooks::LoadedPackage,
};
use once_cell::sync::OnceCell;

use crate::{
    platform::{GpsRiderPlatform, NativePlatform},
    types::GpsRiderFix,
};

pub(crate) struct Runtime {
    module: GpsRiderModule,
    table: HookTable,
}

pub(crate) static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Outcome of a module load
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct GpsRiderLoadReport {
    pub armed: bool,
    pub installed: u32,
    pub skipped: u32,
}

unsafe fn c_str<'a>(s: *const c_char) -> Result<&'a str, GpsRiderError> {
    unsafe { CStr::from_ptr(s) }
        .to_str()
        .map_err(|_| GpsRiderError::InvalidArgument("string is not utf-8".into()))
}

/// Loads the module into this process
///
/// # Arguments
/// * [`package`] - Package name of the process
/// * [`config_path`] - Path of the shared preferences document
/// * [`platform`] - Host callbacks used to resolve targets, call listeners
///   and clear the mock-provider flag
/// * [`out_report`] - If not NULL, receives what was installed
///
/// # Returns
/// An error on failure, NULL on success. Loading twice is an error.
///
/// # Safety
/// `package` and `config_path` must be valid null-terminated C strings.
/// The callbacks in `platform`, and `user_data`, must stay valid and be
/// callable from any thread for the life of the process.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_module_load(
    package: *const c_char,
    config_path: *const c_char,
    platform: GpsRiderPlatform,
    out_report: *mut GpsRiderLoadReport,
) -> *mut GpsRiderFfiError {
    if package.is_null() || config_path.is_null() {
        tracing::error!("Null pointer provided");
        return ffi_err!(GpsRiderError::InvalidArgument("null pointer".into()));
    }
    if RUNTIME.get().is_some() {
        return ffi_err!(GpsRiderError::InternalError("module already loaded".into()));
    }

    let package = match unsafe { c_str(package) } {
        Ok(p) => LoadedPackage::new(p),
        Err(e) => return ffi_err!(e),
    };
    let config_path = match unsafe { c_str(config_path) } {
        Ok(p) => p.to_string(),
        Err(e) => return ffi_err!(e),
    };

    let native = unsafe { NativePlatform::new(platform) };
    let context = Arc::new(SpoofContext::with_parts(
        Arc::new(FileConfig::new(config_path)),
        LocationStore::new(),
        Synthesizer::with_maskers(native.maskers()),
    ));
    let mut module = GpsRiderModule::new(context, Arc::new(native));
    let mut table = HookTable::new(native);
    let report = module.handle_load_package(&package, &mut table);

    let load_report = GpsRiderLoadReport {
        armed: module.state() == HookState::Armed,
        installed: report.installed.len() as u32,
        skipped: report.skipped.len() as u32,
    };
    if RUNTIME.set(Runtime { module, table }).is_err() {
        return ffi_err!(GpsRiderError::InternalError("module already loaded".into()));
    }
    if !out_report.is_null() {
        unsafe { *out_report = load_report };
    }
    std::ptr::null_mut()
}

/// Whether hooks are installed in this process
#[unsafe(no_mangle)]
pub extern "C" fn gpsrider_is_armed() -> bool {
    RUNTIME
        .get()
        .is_some_and(|r| r.module.state() == HookState::Armed)
}

/// Synthesizes a fix from the current state
///
/// # Arguments
/// * [`out_fix`] - Receives the fix
///
/// # Returns
/// An error on failure, NULL on success
///
/// # Safety
/// `out_fix` must be a valid, non-null pointer
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_current_fix(out_fix: *mut GpsRiderFix) -> *mut GpsRiderFfiError {
    if out_fix.is_null() {
        tracing::error!("Null pointer provided");
        return ffi_err!(GpsRiderError::InvalidArgument("null pointer".into()));
    }
    let Some(runtime) = RUNTIME.get() else {
        return ffi_err!(GpsRiderError::ConfigUnavailable);
    };
    let fix = runtime.module.context().build_fix(None, None);
    unsafe { *out_fix = GpsRiderFix::from(&fix) };
    std::ptr::null_mut()
}

/// Frees a string allocated by this library
///
/// # Arguments
/// * [`string`] - The string to free
///
/// # Safety
/// `string` must be a string allocated by this library, or NULL
#[unsafe(no_mangle)]
pub unsafe extern "C" fn gpsrider_string_free(string: *mut c_char) {
    if !string.is_null() {
        let _ = unsafe { CString::from_raw(string) };
    }
}
