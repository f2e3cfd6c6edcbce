//! Renderer configuration.

/// Knobs for a [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    /// Log a warning when a rendered descriptor's render dependencies change.
    /// The diagnostic is recorded either way.
    pub warn_on_rebuild: bool,
    /// Keep component instance records (the devtools-style tree).
    pub track_components: bool,
    /// Bound on the child synchronizer's forward search. `None` searches the
    /// whole live list.
    pub max_sync_search: Option<usize>,
    /// Keep reported diagnostics for [`Renderer::diagnostics`](crate::Renderer::diagnostics).
    pub record_diagnostics: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            warn_on_rebuild: true,
            track_components: true,
            max_sync_search: None,
            record_diagnostics: true,
        }
    }
}

impl RendererConfig {
    pub fn warn_on_rebuild(mut self, on: bool) -> Self {
        self.warn_on_rebuild = on;
        self
    }

    pub fn track_components(mut self, on: bool) -> Self {
        self.track_components = on;
        self
    }

    pub fn max_sync_search(mut self, limit: Option<usize>) -> Self {
        self.max_sync_search = limit;
        self
    }

    pub fn record_diagnostics(mut self, on: bool) -> Self {
        self.record_diagnostics = on;
        self
    }
}
