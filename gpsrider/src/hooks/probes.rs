//! Answers to "is this device tampered with" style queries
//!
//! Apps commonly refuse to run, or distrust locations, when they can see a
//! hooking framework or root. While spoofing is on these report a clean
//! device and available providers.

use std::sync::Arc;

use super::{HookTarget, HookValue, Installer, MethodHook, when_enabled};
use crate::{
    context::SpoofContext,
    fix::{GPS_PROVIDER, NETWORK_PROVIDER},
    obf,
};

/// ConnectionResult.SUCCESS
const PLAY_SERVICES_SUCCESS: i64 = 0;

fn returns(ctx: &Arc<SpoofContext>, value: HookValue) -> MethodHook {
    MethodHook::before(when_enabled(ctx, move |_, param| {
        param.set_result(value.clone());
        Ok(())
    }))
}

pub(super) fn install(installer: &mut Installer<'_>, ctx: &Arc<SpoofContext>) {
    installer.hook(
        HookTarget::method(
            obf!("android.location.LocationManager"),
            obf!("isProviderEnabled"),
            vec![obf!("java.lang.String")],
        ),
        MethodHook::before(when_enabled(ctx, |_, param| {
            if matches!(
                param.arg(0)?.as_str(),
                Some(GPS_PROVIDER | NETWORK_PROVIDER)
            ) {
                param.set_result(HookValue::Bool(true));
            }
            Ok(())
        })),
    );

    installer.hook(
        HookTarget::method(
            obf!("de.robv.android.xposed.XposedBridge"),
            obf!("isXposedEnabled"),
            vec![],
        ),
        returns(ctx, HookValue::Bool(false)),
    );
    installer.hook(
        HookTarget::method(
            obf!("org.lsposed.lspd.core.Main"),
            obf!("isLSPosedEnabled"),
            vec![],
        ),
        returns(ctx, HookValue::Bool(false)),
    );
    installer.hook(
        HookTarget::method(
            obf!("com.topjohnwu.superuser.Shell"),
            obf!("isAppGrantedRoot"),
            vec![],
        ),
        returns(ctx, HookValue::Bool(false)),
    );
    installer.hook(
        HookTarget::method(
            obf!("com.google.android.gms.safetynet.SafetyNet"),
            obf!("isGooglePlayServicesAvailable"),
            vec![obf!("android.content.Context")],
        ),
        returns(ctx, HookValue::Int(PLAY_SERVICES_SUCCESS)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MemoryConfig, SpoofConfig},
        hooks::{HookTable, InstallReport, MethodHookParam},
    };

    fn table(enabled: bool) -> HookTable {
        let ctx = Arc::new(SpoofContext::new(Arc::new(MemoryConfig::new(SpoofConfig {
            enabled,
            ..Default::default()
        }))));
        let mut table = HookTable::permissive();
        let mut report = InstallReport::default();
        install(
            &mut Installer {
                registry: &mut table,
                report: &mut report,
            },
            &ctx,
        );
        assert_eq!(report.installed.len(), 5);
        table
    }

    fn provider_enabled(table: &HookTable, provider: &str) -> HookValue {
        let target = table
            .lookup(
                "android.location.LocationManager",
                "isProviderEnabled",
                &["java.lang.String"],
            )
            .cloned()
            .unwrap();
        let mut param =
            MethodHookParam::new(HookValue::Object(1), vec![HookValue::Str(provider.into())]);
        table.dispatch(&target, &mut param, |_| HookValue::Bool(false))
    }

    #[test]
    fn providers_report_enabled() {
        let table = table(true);
        assert_eq!(provider_enabled(&table, "gps"), HookValue::Bool(true));
        assert_eq!(provider_enabled(&table, "network"), HookValue::Bool(true));
        assert_eq!(provider_enabled(&table, "passive"), HookValue::Bool(false));
    }

    #[test]
    fn framework_probes_report_clean() {
        let table = table(true);
        let target = table
            .lookup("de.robv.android.xposed.XposedBridge", "isXposedEnabled", &[])
            .cloned()
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Null, vec![]);
        assert_eq!(
            table.dispatch(&target, &mut param, |_| HookValue::Bool(true)),
            HookValue::Bool(false)
        );

        let target = table
            .lookup(
                "com.google.android.gms.safetynet.SafetyNet",
                "isGooglePlayServicesAvailable",
                &["android.content.Context"],
            )
            .cloned()
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Null, vec![HookValue::Object(2)]);
        assert_eq!(
            table.dispatch(&target, &mut param, |_| HookValue::Int(9)),
            HookValue::Int(0)
        );
    }

    #[test]
    fn probes_follow_kill_switch() {
        let table = table(false);
        assert_eq!(provider_enabled(&table, "gps"), HookValue::Bool(false));
    }
}
