//! Entry point run when the module is loaded into a process

use std::sync::Arc;

use tracing::{debug, info};

use super::{HookRegistry, HookTarget, Installer, ObjectInvoker, location, manager, probes, system};
use crate::{MANAGER_PACKAGE, SYSTEM_SERVER_PACKAGE, context::SpoofContext};

/// The process the module was just loaded into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPackage {
    pub package_name: String,
}

impl LoadedPackage {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
        }
    }

    pub fn is_system_server(&self) -> bool {
        self.package_name == SYSTEM_SERVER_PACKAGE
    }
}

/// Lifecycle of the module inside one process
///
/// There is no way back from `Armed`: installed hooks live as long as the
/// process. Disabling is handled per call by the kill switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookState {
    #[default]
    Dormant,
    Armed,
}

/// What a load installed and what it had to skip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallReport {
    pub installed: Vec<HookTarget>,
    pub skipped: Vec<(HookTarget, String)>,
}

impl InstallReport {
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty() && self.skipped.is_empty()
    }
}

/// Installs the interceptors into one process
pub struct GpsRiderModule {
    context: Arc<SpoofContext>,
    invoker: Arc<dyn ObjectInvoker>,
    manager_package: String,
    state: HookState,
}

impl std::fmt::Debug for GpsRiderModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpsRiderModule")
            .field("context", &self.context)
            .field("manager_package", &self.manager_package)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl GpsRiderModule {
    pub fn new(context: Arc<SpoofContext>, invoker: Arc<dyn ObjectInvoker>) -> Self {
        Self {
            context,
            invoker,
            manager_package: MANAGER_PACKAGE.to_string(),
            state: HookState::Dormant,
        }
    }

    /// Overrides the package that is never hooked
    pub fn with_manager_package(mut self, package: impl Into<String>) -> Self {
        self.manager_package = package.into();
        self
    }

    pub fn state(&self) -> HookState {
        self.state
    }

    pub fn context(&self) -> &Arc<SpoofContext> {
        &self.context
    }

    /// Arms the module for `package` unless it is the companion app or
    /// spoofing is off
    ///
    /// Every target is installed on its own; a target missing on this
    /// platform version is recorded in the report and the rest still go in.
    /// Calling this again once armed installs nothing.
    pub fn handle_load_package(
        &mut self,
        package: &LoadedPackage,
        registry: &mut dyn HookRegistry,
    ) -> InstallReport {
        let mut report = InstallReport::default();

        if self.state == HookState::Armed {
            debug!("Already armed, ignoring load of {}", package.package_name);
            return report;
        }
        if package.package_name == self.manager_package {
            debug!("Not hooking the manager app");
            return report;
        }
        let config = match self.context.load_config() {
            Ok(c) => c,
            Err(e) => {
                debug!("Configuration unreadable, staying dormant: {e}");
                return report;
            }
        };
        if !config.enabled {
            debug!("Spoofing disabled, staying dormant in {}", package.package_name);
            return report;
        }

        let mut installer = Installer {
            registry,
            report: &mut report,
        };
        location::install_immediate(&mut installer, &self.context);
        location::install_record(&mut installer, &self.context);
        manager::install(&mut installer, &self.context);
        probes::install(&mut installer, &self.context);
        if package.is_system_server() && config.hook_system_services {
            system::install(&mut installer, &self.context, &self.invoker);
        }

        self.state = HookState::Armed;
        info!(
            "Armed in {}: {} hooks installed, {} skipped",
            package.package_name,
            report.installed.len(),
            report.skipped.len()
        );
        report
    }
}
