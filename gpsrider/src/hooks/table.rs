//! In-process hook table: the registry a native trampoline dispatches into

use std::{
    borrow::Cow,
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
};

use tracing::{debug, trace};

use super::{HookFn, HookRegistry, HookTarget, HookValue, MethodHook, MethodHookParam};
use crate::GpsRiderError;

/// Decides whether a target exists on the running platform
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, target: &HookTarget) -> bool;
}

impl<F> TargetResolver for F
where
    F: Fn(&HookTarget) -> bool + Send + Sync,
{
    fn resolve(&self, target: &HookTarget) -> bool {
        self(target)
    }
}

/// Resolves every target
#[derive(Debug, Default, Clone, Copy)]
pub struct AllTargets;

impl TargetResolver for AllTargets {
    fn resolve(&self, _target: &HookTarget) -> bool {
        true
    }
}

/// Installed targets by class, then method name
type TargetIndex = HashMap<Cow<'static, str>, HashMap<Cow<'static, str>, Vec<HookTarget>>>;

/// Interceptors by target
pub struct HookTable {
    resolver: Box<dyn TargetResolver>,
    hooks: HashMap<HookTarget, Vec<MethodHook>>,
    index: TargetIndex,
}

impl std::fmt::Debug for HookTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl Default for HookTable {
    fn default() -> Self {
        Self::permissive()
    }
}

impl HookRegistry for HookTable {
    fn hook(&mut self, target: HookTarget, hook: MethodHook) -> Result<(), GpsRiderError> {
        if !self.resolver.resolve(&target) {
            return Err(GpsRiderError::TargetNotFound(target.to_string()));
        }
        trace!("Hooked {target}");
        if !self.hooks.contains_key(&target) {
            self.index
                .entry(target.class.clone())
                .or_default()
                .entry(target.method.clone())
                .or_default()
                .push(target.clone());
        }
        self.hooks.entry(target).or_default().push(hook);
        Ok(())
    }
}

impl HookTable {
    pub fn new(resolver: impl TargetResolver + 'static) -> Self {
        Self {
            resolver: Box::new(resolver),
            hooks: HashMap::new(),
            index: HashMap::new(),
        }
    }

    /// A table on a platform where every target exists
    pub fn permissive() -> Self {
        Self::new(AllTargets)
    }

    pub fn is_hooked(&self, target: &HookTarget) -> bool {
        self.hooks.contains_key(target)
    }

    pub fn targets(&self) -> impl Iterator<Item = &HookTarget> {
        self.hooks.keys()
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Finds the installed target for a call, preferring the exact overload
    /// over an every-overload hook
    pub fn lookup(&self, class: &str, method: &str, params: &[&str]) -> Option<&HookTarget> {
        let candidates = self.index.get(class)?.get(method)?;
        candidates
            .iter()
            .find(|t| {
                t.params.as_ref().is_some_and(|p| {
                    p.len() == params.len() && p.iter().zip(params).all(|(a, b)| a == b)
                })
            })
            .or_else(|| candidates.iter().find(|t| t.params.is_none()))
    }

    /// Runs the before-hooks of `target`; true if one set a result, meaning
    /// the original must be skipped
    pub fn before(&self, target: &HookTarget, param: &mut MethodHookParam) -> bool {
        if let Some(hooks) = self.hooks.get(target) {
            for hook in hooks {
                if let Some(f) = &hook.before {
                    run_guarded(target, f, param);
                }
            }
        }
        param.has_result()
    }

    /// Runs the after-hooks of `target`
    pub fn after(&self, target: &HookTarget, param: &mut MethodHookParam) {
        if let Some(hooks) = self.hooks.get(target) {
            for hook in hooks {
                if let Some(f) = &hook.after {
                    run_guarded(target, f, param);
                }
            }
        }
    }

    /// Full call: before-hooks, the original unless skipped, after-hooks
    pub fn dispatch<F>(
        &self,
        target: &HookTarget,
        param: &mut MethodHookParam,
        original: F,
    ) -> HookValue
    where
        F: FnOnce(&MethodHookParam) -> HookValue,
    {
        if !self.before(target, param) {
            let value = original(param);
            param.set_result(value);
        }
        self.after(target, param);
        param.take_result().unwrap_or(HookValue::Null)
    }
}

/// Runs one interceptor; on error or panic the call is put back exactly as
/// it was so the host sees original behaviour
///
/// The snapshot shares strings and records with `param`; only a record the
/// interceptor writes to is copied.
fn run_guarded(target: &HookTarget, f: &HookFn, param: &mut MethodHookParam) {
    let snapshot = param.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(param)));
    let err = match outcome {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(_) => GpsRiderError::HookPanicked,
    };
    debug!("Hook on {target} failed, passing through: {err}");
    *param = snapshot;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{fix::LocationFix, obf};

    fn target() -> HookTarget {
        HookTarget::method(obf!("a.Location"), obf!("getLatitude"), vec![])
    }

    #[test]
    fn missing_target_is_reported() {
        let mut table = HookTable::new(|t: &HookTarget| t.method != "getLatitude");
        let err = table
            .hook(target(), MethodHook::before(Arc::new(|_| Ok(()))))
            .unwrap_err();
        assert!(matches!(err, GpsRiderError::TargetNotFound(_)));
        assert!(table.is_empty());
    }

    #[test]
    fn before_result_skips_original() {
        let mut table = HookTable::permissive();
        table
            .hook(
                target(),
                MethodHook::before(Arc::new(|p| {
                    p.set_result(HookValue::Double(1.5));
                    Ok(())
                })),
            )
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Object(1), vec![]);
        let v = table.dispatch(&target(), &mut param, |_| panic!("original must not run"));
        assert_eq!(v, HookValue::Double(1.5));
    }

    #[test]
    fn failing_hook_passes_through() {
        let mut table = HookTable::permissive();
        table
            .hook(
                target(),
                MethodHook::before(Arc::new(|p| {
                    p.args.clear();
                    p.set_result(HookValue::Double(9.0));
                    Err(GpsRiderError::UnexpectedValue)
                })),
            )
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Null, vec![HookValue::Int(3)]);
        let v = table.dispatch(&target(), &mut param, |p| {
            assert_eq!(p.args, vec![HookValue::Int(3)]);
            HookValue::Double(2.0)
        });
        assert_eq!(v, HookValue::Double(2.0));
    }

    #[test]
    fn panicking_hook_passes_through_and_later_hooks_run() {
        let mut table = HookTable::permissive();
        table
            .hook(target(), MethodHook::before(Arc::new(|_| panic!("boom"))))
            .unwrap();
        table
            .hook(
                target(),
                MethodHook::after(Arc::new(|p| {
                    if let Some(HookValue::Double(d)) = p.result() {
                        let d = *d;
                        p.set_result(HookValue::Double(d + 1.0));
                    }
                    Ok(())
                })),
            )
            .unwrap();
        let mut param = MethodHookParam::new(HookValue::Null, vec![]);
        let v = table.dispatch(&target(), &mut param, |_| HookValue::Double(2.0));
        assert_eq!(v, HookValue::Double(3.0));
    }

    #[test]
    fn failed_hook_restores_record() {
        let ctor = HookTarget::constructor(obf!("a.Location"), vec![]);
        let mut table = HookTable::permissive();
        table
            .hook(
                ctor.clone(),
                MethodHook::after(Arc::new(|p| {
                    if let Some(fix) = p.this.as_location_mut() {
                        fix.latitude = 45.0;
                    }
                    Err(GpsRiderError::UnexpectedValue)
                })),
            )
            .unwrap();
        let mut param = MethodHookParam::new(LocationFix::new("gps").into(), vec![]);
        table.dispatch(&ctor, &mut param, |_| HookValue::Null);
        assert_eq!(param.this.as_location().unwrap().latitude, 0.0);
    }

    #[test]
    fn lookup_prefers_exact_overload() {
        let mut table = HookTable::permissive();
        let exact = HookTarget::method(obf!("a.B"), obf!("m"), vec![obf!("int")]);
        let any = HookTarget::all_overloads(obf!("a.B"), obf!("m"));
        table.hook(exact.clone(), MethodHook::default()).unwrap();
        table.hook(any.clone(), MethodHook::default()).unwrap();
        assert_eq!(table.lookup("a.B", "m", &["int"]), Some(&exact));
        assert_eq!(table.lookup("a.B", "m", &["long"]), Some(&any));
        assert_eq!(table.lookup("a.B", "n", &[]), None);
    }

    #[test]
    fn unhooked_target_runs_original() {
        let table = HookTable::permissive();
        let mut param = MethodHookParam::new(HookValue::Null, vec![]);
        let v = table.dispatch(&target(), &mut param, |_| HookValue::Bool(true));
        assert_eq!(v, HookValue::Bool(true));
    }
}
