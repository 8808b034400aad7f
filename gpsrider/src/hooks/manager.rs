//! Hooks on the app-facing location manager

use std::sync::Arc;

use super::{HookTarget, HookValue, Installer, MethodHook, when_enabled};
use crate::{GpsRiderError, context::SpoofContext, obf};

pub(super) fn install(installer: &mut Installer<'_>, ctx: &Arc<SpoofContext>) {
    installer.hook(
        HookTarget::method(
            obf!("android.location.LocationManager"),
            obf!("getLastKnownLocation"),
            vec![obf!("java.lang.String")],
        ),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            let provider = match param.arg(0)? {
                HookValue::Str(p) => Some(&**p),
                HookValue::Null => None,
                _ => return Err(GpsRiderError::UnexpectedValue),
            };
            let fix = ctx.build_fix(None, provider);
            param.set_result(fix.into());
            Ok(())
        })),
    );
}
