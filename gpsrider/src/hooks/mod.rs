//! Interception layer.
//!
//! The instrumentation mechanism itself is platform specific. Everything here
//! is written against [`HookRegistry`] (install an interceptor on a target)
//! and [`ObjectInvoker`] (call a method on a host object); a platform adapter
//! supplies both. [`HookTable`] is the in-process reference registry that a
//! native trampoline dispatches into.
//!
//! Interceptors never let an error or panic reach the host: the table
//! restores the call to its pre-hook state and lets the original run.

mod location;
mod manager;
mod module;
mod probes;
mod system;
mod table;

pub use module::{GpsRiderModule, HookState, InstallReport, LoadedPackage};
pub use table::{AllTargets, HookTable, TargetResolver};

use std::{borrow::Cow, fmt, sync::Arc};

use tracing::debug;

use crate::{GpsRiderError, context::SpoofContext, fix::LocationFix};

/// Method name used for constructors
pub const CONSTRUCTOR: &str = "<init>";

/// Opaque reference to an object owned by the host runtime
pub type ObjectHandle = u64;

/// A method (or constructor) that can be intercepted
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookTarget {
    pub class: Cow<'static, str>,
    pub method: Cow<'static, str>,
    /// Parameter type names; `None` matches every overload
    pub params: Option<Vec<Cow<'static, str>>>,
}

impl HookTarget {
    pub fn method(
        class: Cow<'static, str>,
        method: Cow<'static, str>,
        params: Vec<Cow<'static, str>>,
    ) -> Self {
        Self {
            class,
            method,
            params: Some(params),
        }
    }

    /// Every overload of `method`
    pub fn all_overloads(class: Cow<'static, str>, method: Cow<'static, str>) -> Self {
        Self {
            class,
            method,
            params: None,
        }
    }

    pub fn constructor(class: Cow<'static, str>, params: Vec<Cow<'static, str>>) -> Self {
        Self::method(class, Cow::Borrowed(CONSTRUCTOR), params)
    }

    pub fn is_constructor(&self) -> bool {
        self.method == CONSTRUCTOR
    }
}

impl fmt::Display for HookTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.method)?;
        match &self.params {
            Some(params) => write!(f, "({})", params.join(", ")),
            None => f.write_str("(..)"),
        }
    }
}

/// A value crossing the platform boundary
///
/// Strings and records are shared, so cloning a value never copies them;
/// [`HookValue::as_location_mut`] copies a shared record before writing.
#[derive(Debug, Clone, PartialEq)]
pub enum HookValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    Location(Arc<LocationFix>),
    Object(ObjectHandle),
}

impl HookValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HookValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_location(&self) -> Option<&LocationFix> {
        match self {
            HookValue::Location(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_location_mut(&mut self) -> Option<&mut LocationFix> {
        match self {
            HookValue::Location(l) => Some(Arc::make_mut(l)),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, HookValue::Null)
    }
}

impl From<LocationFix> for HookValue {
    fn from(value: LocationFix) -> Self {
        HookValue::Location(Arc::new(value))
    }
}

/// One intercepted call
///
/// A before-hook that sets a result makes the original method be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodHookParam {
    pub this: HookValue,
    pub args: Vec<HookValue>,
    result: Option<HookValue>,
}

impl MethodHookParam {
    pub fn new(this: HookValue, args: Vec<HookValue>) -> Self {
        Self {
            this,
            args,
            result: None,
        }
    }

    pub fn set_result(&mut self, value: HookValue) {
        self.result = Some(value);
    }

    pub fn result(&self) -> Option<&HookValue> {
        self.result.as_ref()
    }

    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn take_result(&mut self) -> Option<HookValue> {
        self.result.take()
    }

    pub fn arg(&self, index: usize) -> Result<&HookValue, GpsRiderError> {
        self.args.get(index).ok_or(GpsRiderError::UnexpectedValue)
    }
}

/// Interceptor body
pub type HookFn = Arc<dyn Fn(&mut MethodHookParam) -> Result<(), GpsRiderError> + Send + Sync>;

/// Interceptors run before and/or after the original method
#[derive(Clone, Default)]
pub struct MethodHook {
    pub before: Option<HookFn>,
    pub after: Option<HookFn>,
}

impl fmt::Debug for MethodHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHook")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl MethodHook {
    pub fn before(f: HookFn) -> Self {
        Self {
            before: Some(f),
            after: None,
        }
    }

    pub fn after(f: HookFn) -> Self {
        Self {
            before: None,
            after: Some(f),
        }
    }
}

/// Installs interceptors; implemented by the platform adapter
pub trait HookRegistry {
    /// Fails with [`GpsRiderError::TargetNotFound`] when this platform
    /// version has no such method
    fn hook(&mut self, target: HookTarget, hook: MethodHook) -> Result<(), GpsRiderError>;
}

/// Calls methods on host objects, e.g. a listener's `onLocationChanged`
pub trait ObjectInvoker: Send + Sync {
    fn call_method(
        &self,
        object: &HookValue,
        method: &str,
        args: &[HookValue],
    ) -> Result<HookValue, GpsRiderError>;
}

/// Invoker for hosts that cannot call back into objects
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInvoker;

impl ObjectInvoker for NoInvoker {
    fn call_method(
        &self,
        _object: &HookValue,
        method: &str,
        _args: &[HookValue],
    ) -> Result<HookValue, GpsRiderError> {
        Err(GpsRiderError::TargetNotFound(method.to_string()))
    }
}

/// Wraps `f` so it only runs while spoofing is enabled
///
/// The kill switch is read on every call so disabling takes effect without
/// reinstalling anything.
fn when_enabled<F>(ctx: &Arc<SpoofContext>, f: F) -> HookFn
where
    F: Fn(&SpoofContext, &mut MethodHookParam) -> Result<(), GpsRiderError>
        + Send
        + Sync
        + 'static,
{
    let ctx = ctx.clone();
    Arc::new(move |param| {
        if !ctx.is_enabled() {
            return Ok(());
        }
        f(&ctx, param)
    })
}

/// Records what got installed while a group of hooks goes in
struct Installer<'a> {
    registry: &'a mut dyn HookRegistry,
    report: &'a mut InstallReport,
}

impl Installer<'_> {
    /// Installs one hook; a missing target is recorded and skipped
    fn hook(&mut self, target: HookTarget, hook: MethodHook) {
        match self.registry.hook(target.clone(), hook) {
            Ok(()) => self.report.installed.push(target),
            Err(e) => {
                debug!("Skipping hook {target}: {e}");
                self.report.skipped.push((target, e.to_string()));
            }
        }
    }
}
