//! The per-process spoofing context handed to every hook.

use std::sync::Arc;

use crate::{
    GpsRiderError,
    config::{ConfigSource, SpoofConfig},
    fix::LocationFix,
    store::{CachedFix, LocationState, LocationStore},
    synthesizer::Synthesizer,
};

/// Configuration reader, location store and synthesizer of one hooked process
///
/// Built once when the module loads into a process and shared (behind an
/// [`Arc`]) by every installed interceptor.
pub struct SpoofContext {
    config: Arc<dyn ConfigSource>,
    store: LocationStore,
    synthesizer: Synthesizer,
}

impl std::fmt::Debug for SpoofContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoofContext")
            .field("store", &self.store)
            .field("synthesizer", &self.synthesizer)
            .finish_non_exhaustive()
    }
}

impl SpoofContext {
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self::with_parts(config, LocationStore::new(), Synthesizer::new())
    }

    pub fn with_parts(
        config: Arc<dyn ConfigSource>,
        store: LocationStore,
        synthesizer: Synthesizer,
    ) -> Self {
        Self {
            config,
            store,
            synthesizer,
        }
    }

    /// The global kill switch, read on every intercepted call
    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn load_config(&self) -> Result<SpoofConfig, GpsRiderError> {
        self.config.load()
    }

    /// Refreshes the shared state if stale and returns it
    pub fn refresh(&self) -> LocationState {
        self.store.refresh_if_stale(|| self.config.load()).state
    }

    /// The last published snapshot, without refreshing
    pub fn current(&self) -> CachedFix {
        self.store.current_fix()
    }

    /// Refreshes, then builds a fix (see [`Synthesizer::build_fix`])
    pub fn build_fix(&self, original: Option<&LocationFix>, provider: Option<&str>) -> LocationFix {
        let state = self.refresh();
        self.synthesizer.build_fix(&state, original, provider)
    }

    /// Refreshes, then overwrites a freshly constructed record in place
    pub fn stamp_constructed(&self, fix: &mut LocationFix) {
        let state = self.refresh();
        self.synthesizer.stamp_constructed(&state, fix);
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synthesizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{MemoryConfig, Setting, SpoofConfig},
        geo::LatLng,
    };

    #[test]
    fn kill_switch_is_read_live() {
        let config = MemoryConfig::new(SpoofConfig {
            enabled: true,
            ..Default::default()
        });
        let ctx = SpoofContext::new(Arc::new(config.clone()));
        assert!(ctx.is_enabled());
        config.modify(|c| c.enabled = false);
        assert!(!ctx.is_enabled());
    }

    #[test]
    fn build_fix_uses_configured_center() {
        let config = MemoryConfig::new(SpoofConfig {
            enabled: true,
            center: Some(LatLng::new(52.52, 13.405)),
            accuracy: Setting::on(12.0),
            ..Default::default()
        });
        let ctx = SpoofContext::new(Arc::new(config));
        let fix = ctx.build_fix(None, Some("network"));
        assert_eq!(fix.position(), LatLng::new(52.52, 13.405));
        assert_eq!(fix.accuracy, Some(12.0));
        assert_eq!(fix.provider, "network");
        assert_eq!(ctx.current().state.position(), fix.position());
    }
}
