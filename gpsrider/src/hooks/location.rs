//! Hooks on the location record type

use std::{borrow::Cow, sync::Arc};

use super::{HookTarget, HookValue, Installer, MethodHook, MethodHookParam, when_enabled};
use crate::{GpsRiderError, context::SpoofContext, obf, store::LocationState};

fn location_class() -> Cow<'static, str> {
    obf!("android.location.Location")
}

fn getter(method: Cow<'static, str>) -> HookTarget {
    HookTarget::method(location_class(), method, vec![])
}

/// Returns `value` for every call while enabled
fn constant(ctx: &Arc<SpoofContext>, value: HookValue) -> MethodHook {
    MethodHook::before(when_enabled(ctx, move |_, param| {
        param.set_result(value.clone());
        Ok(())
    }))
}

/// Answers a `has*` query with `true` when the matching getter is overridden
///
/// Otherwise the record answers for itself, same as its getter.
fn reports_field(
    ctx: &Arc<SpoofContext>,
    configured: fn(&LocationState) -> bool,
) -> MethodHook {
    MethodHook::before(when_enabled(ctx, move |ctx, param| {
        if configured(&ctx.refresh()) {
            param.set_result(HookValue::Bool(true));
        }
        Ok(())
    }))
}

/// Coordinate getters and the mock-provider query
///
/// These are the hooks that must be live before anything else reads a
/// location in the process.
pub(super) fn install_immediate(installer: &mut Installer<'_>, ctx: &Arc<SpoofContext>) {
    installer.hook(
        getter(obf!("getLatitude")),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            param.set_result(HookValue::Double(ctx.refresh().latitude));
            Ok(())
        })),
    );
    installer.hook(
        getter(obf!("getLongitude")),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            param.set_result(HookValue::Double(ctx.refresh().longitude));
            Ok(())
        })),
    );
    installer.hook(
        getter(obf!("isFromMockProvider")),
        constant(ctx, HookValue::Bool(false)),
    );
}

/// The remaining getters, the copy setter and construction
pub(super) fn install_record(installer: &mut Installer<'_>, ctx: &Arc<SpoofContext>) {
    // Unconfigured values fall through to the record's own
    installer.hook(
        getter(obf!("getAccuracy")),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            if let Some(v) = ctx.refresh().accuracy() {
                param.set_result(HookValue::Float(v));
            }
            Ok(())
        })),
    );
    installer.hook(
        getter(obf!("getAltitude")),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            if let Some(v) = ctx.refresh().altitude() {
                param.set_result(HookValue::Double(v));
            }
            Ok(())
        })),
    );
    installer.hook(
        getter(obf!("getSpeed")),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            if let Some(v) = ctx.refresh().speed() {
                param.set_result(HookValue::Float(v));
            }
            Ok(())
        })),
    );

    installer.hook(
        getter(obf!("hasAccuracy")),
        reports_field(ctx, |s| s.accuracy().is_some()),
    );
    installer.hook(
        getter(obf!("hasAltitude")),
        reports_field(ctx, |s| s.altitude().is_some()),
    );
    installer.hook(
        getter(obf!("hasSpeed")),
        reports_field(ctx, |s| s.speed().is_some()),
    );
    installer.hook(getter(obf!("isMock")), constant(ctx, HookValue::Bool(false)));

    installer.hook(
        HookTarget::method(location_class(), obf!("set"), vec![location_class()]),
        MethodHook::before(when_enabled(ctx, replace_location_arg(0))),
    );

    installer.hook(
        HookTarget::constructor(location_class(), vec![obf!("java.lang.String")]),
        MethodHook::after(when_enabled(ctx, |ctx, param| {
            let fix = param
                .this
                .as_location_mut()
                .ok_or(GpsRiderError::UnexpectedValue)?;
            ctx.stamp_constructed(fix);
            Ok(())
        })),
    );
}

/// Replaces the location argument at `index` with a synthesized one
///
/// A null argument gets a fresh record; anything else keeps the original's
/// provider and timing.
pub(super) fn replace_location_arg(
    index: usize,
) -> impl Fn(&SpoofContext, &mut MethodHookParam) -> Result<(), GpsRiderError> + Send + Sync + 'static
{
    move |ctx, param| {
        let fix = match param.arg(index)? {
            HookValue::Null => ctx.build_fix(None, None),
            HookValue::Location(original) => ctx.build_fix(Some(original), None),
            _ => return Err(GpsRiderError::UnexpectedValue),
        };
        param.args[index] = fix.into();
        Ok(())
    }
}
