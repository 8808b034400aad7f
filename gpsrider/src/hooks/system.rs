//! Hooks inside the system server's location service
//!
//! Only installed into the system server process, and only when the
//! configuration asks for it. Apps that talk to the service directly, or
//! receive locations through listeners, are covered here.

use std::{borrow::Cow, sync::Arc};

use tracing::debug;

use super::{
    HookTarget, HookValue, Installer, MethodHook, ObjectInvoker, location::replace_location_arg,
    when_enabled,
};
use crate::{GpsRiderError, context::SpoofContext, obf};

fn service_class() -> Cow<'static, str> {
    obf!("com.android.server.LocationManagerService")
}

fn string() -> Cow<'static, str> {
    obf!("java.lang.String")
}

/// Hands a synthesized fix to the listener argument at `index`
///
/// The registration itself still goes through, so later genuine updates
/// keep being delivered (and overwritten by the callback hook).
fn deliver_to_listener(
    ctx: &Arc<SpoofContext>,
    invoker: &Arc<dyn ObjectInvoker>,
    index: usize,
) -> MethodHook {
    let invoker = invoker.clone();
    MethodHook::before(when_enabled(ctx, move |ctx, param| {
        let listener = param.arg(index)?;
        if !matches!(listener, HookValue::Object(_)) {
            return Err(GpsRiderError::UnexpectedValue);
        }
        let fix = ctx.build_fix(None, None);
        if let Err(e) = invoker.call_method(listener, &obf!("onLocationChanged"), &[fix.into()]) {
            debug!("Listener delivery failed: {e}");
        }
        Ok(())
    }))
}

pub(super) fn install(
    installer: &mut Installer<'_>,
    ctx: &Arc<SpoofContext>,
    invoker: &Arc<dyn ObjectInvoker>,
) {
    installer.hook(
        HookTarget::method(
            service_class(),
            obf!("getLastLocation"),
            vec![obf!("android.location.LocationRequest"), string()],
        ),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            param.set_result(ctx.build_fix(None, None).into());
            Ok(())
        })),
    );
    installer.hook(
        HookTarget::method(
            service_class(),
            obf!("getLastLocation"),
            vec![string(), string()],
        ),
        MethodHook::before(when_enabled(ctx, |ctx, param| {
            let provider = param.arg(0)?.as_str().map(str::to_owned);
            param.set_result(ctx.build_fix(None, provider.as_deref()).into());
            Ok(())
        })),
    );

    installer.hook(
        HookTarget::method(
            service_class(),
            obf!("requestLocationUpdates"),
            vec![
                obf!("android.location.LocationRequest"),
                obf!("android.location.ILocationListener"),
                obf!("android.app.PendingIntent"),
                string(),
            ],
        ),
        deliver_to_listener(ctx, invoker, 1),
    );
    installer.hook(
        HookTarget::method(
            service_class(),
            obf!("requestLocationUpdates"),
            vec![
                string(),
                obf!("long"),
                obf!("float"),
                obf!("android.location.ILocationListener"),
                obf!("android.app.PendingIntent"),
                string(),
            ],
        ),
        deliver_to_listener(ctx, invoker, 3),
    );

    installer.hook(
        HookTarget::method(
            obf!("com.android.server.LocationManagerService$Receiver"),
            obf!("callLocationChangedLocked"),
            vec![obf!("android.location.Location")],
        ),
        MethodHook::before(when_enabled(ctx, replace_location_arg(0))),
    );

    // Raw GNSS data would contradict the fake position
    for method in [
        obf!("addGnssBatchingCallback"),
        obf!("addGnssMeasurementsListener"),
        obf!("addGnssNavigationMessageListener"),
        obf!("registerGnssBatchingCallback"),
        obf!("unregisterGnssBatchingCallback"),
    ] {
        installer.hook(
            HookTarget::all_overloads(service_class(), method),
            MethodHook::before(when_enabled(ctx, |_, param| {
                param.set_result(HookValue::Bool(false));
                Ok(())
            })),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        config::{MemoryConfig, SpoofConfig},
        fix::LocationFix,
        geo::LatLng,
        hooks::{HookTable, InstallReport, MethodHookParam},
    };

    #[derive(Default)]
    struct RecordingInvoker {
        calls: Mutex<Vec<(HookValue, String, Vec<HookValue>)>>,
    }

    impl ObjectInvoker for RecordingInvoker {
        fn call_method(
            &self,
            object: &HookValue,
            method: &str,
            args: &[HookValue],
        ) -> Result<HookValue, GpsRiderError> {
            self.calls
                .lock()
                .unwrap()
                .push((object.clone(), method.to_string(), args.to_vec()));
            Ok(HookValue::Null)
        }
    }

    fn setup() -> (HookTable, Arc<RecordingInvoker>) {
        let ctx = Arc::new(SpoofContext::new(Arc::new(MemoryConfig::new(SpoofConfig {
            enabled: true,
            center: Some(LatLng::new(-33.8688, 151.2093)),
            ..Default::default()
        }))));
        let recorder = Arc::new(RecordingInvoker::default());
        let invoker: Arc<dyn ObjectInvoker> = recorder.clone();
        let mut table = HookTable::permissive();
        let mut report = InstallReport::default();
        install(
            &mut Installer {
                registry: &mut table,
                report: &mut report,
            },
            &ctx,
            &invoker,
        );
        assert_eq!(report.installed.len(), 10);
        (table, recorder)
    }

    #[test]
    fn listener_receives_fix_and_registration_proceeds() {
        let (table, recorder) = setup();
        let target = table
            .lookup(
                "com.android.server.LocationManagerService",
                "requestLocationUpdates",
                &[
                    "java.lang.String",
                    "long",
                    "float",
                    "android.location.ILocationListener",
                    "android.app.PendingIntent",
                    "java.lang.String",
                ],
            )
            .cloned()
            .unwrap();
        let mut param = MethodHookParam::new(
            HookValue::Object(1),
            vec![
                HookValue::Str("gps".into()),
                HookValue::Int(1000),
                HookValue::Float(0.0),
                HookValue::Object(42),
                HookValue::Null,
                HookValue::Str("com.example".into()),
            ],
        );
        let mut original_ran = false;
        table.dispatch(&target, &mut param, |_| {
            original_ran = true;
            HookValue::Null
        });
        assert!(original_ran);

        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, HookValue::Object(42));
        assert_eq!(calls[0].1, "onLocationChanged");
        let fix = calls[0].2[0].as_location().unwrap();
        assert_eq!(fix.position(), LatLng::new(-33.8688, 151.2093));
    }

    #[test]
    fn receiver_callback_location_is_replaced() {
        let (table, _) = setup();
        let target = table
            .lookup(
                "com.android.server.LocationManagerService$Receiver",
                "callLocationChangedLocked",
                &["android.location.Location"],
            )
            .cloned()
            .unwrap();
        let mut param =
            MethodHookParam::new(HookValue::Object(1), vec![LocationFix::new("gps").into()]);
        table.dispatch(&target, &mut param, |p| {
            assert_eq!(
                p.args[0].as_location().unwrap().position(),
                LatLng::new(-33.8688, 151.2093)
            );
            HookValue::Bool(true)
        });
    }

    #[test]
    fn gnss_registration_is_refused() {
        let (table, _) = setup();
        let target = table
            .lookup(
                "com.android.server.LocationManagerService",
                "addGnssMeasurementsListener",
                &["android.location.IGnssMeasurementsListener", "java.lang.String"],
            )
            .cloned()
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Object(1), vec![HookValue::Object(5)]);
        assert_eq!(
            table.dispatch(&target, &mut param, |_| HookValue::Bool(true)),
            HookValue::Bool(false)
        );
    }

    #[test]
    fn last_location_by_provider() {
        let (table, _) = setup();
        let target = table
            .lookup(
                "com.android.server.LocationManagerService",
                "getLastLocation",
                &["java.lang.String", "java.lang.String"],
            )
            .cloned()
            .unwrap();
        let mut param = MethodHookParam::new(
            HookValue::Object(1),
            vec![HookValue::Str("network".into()), HookValue::Str("pkg".into())],
        );
        let v = table.dispatch(&target, &mut param, |_| HookValue::Null);
        assert_eq!(v.as_location().unwrap().provider, "network");
    }
}
