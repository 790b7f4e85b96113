/// How a collected object's native resource reaches the engine's release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Release directly from the finalizer (the engine's release is cheap).
    #[default]
    Inline,
    /// Queue the resource from the finalizer and release it from a
    /// [`ReleaseWorker`](crate::ReleaseWorker), off the collector's path.
    Offload,
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Where native releases run (default: inline in the finalizer)
    pub release_policy: ReleasePolicy,
    /// Report attached resources' estimated sizes to V8 as external memory
    /// (default: true)
    pub track_external_memory: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            release_policy: ReleasePolicy::Inline,
            track_external_memory: true,
        }
    }
}
