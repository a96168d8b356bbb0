//! Viewer registration guard

use std::sync::Arc;

use crate::registry::RegistryError;
use crate::registry::{StreamKey, StreamRegistry, ViewerId};
use crate::upstream::UpstreamConnector;

/// A viewer's slot in the registry, held by its pipeline
///
/// Released explicitly when the pipeline finishes. If the pipeline is
/// dropped first (never run, or its task aborted), the drop detaches the
/// viewer on the runtime instead, so the stream can still tear down.
pub(crate) struct ViewerLease<C: UpstreamConnector> {
    registry: Arc<StreamRegistry<C>>,
    key: StreamKey,
    id: ViewerId,
    armed: bool,
}

impl<C: UpstreamConnector> ViewerLease<C> {
    pub(crate) fn new(registry: Arc<StreamRegistry<C>>, key: StreamKey, id: ViewerId) -> Self {
        Self {
            registry,
            key,
            id,
            armed: true,
        }
    }

    pub(crate) fn registry(&self) -> &StreamRegistry<C> {
        &self.registry
    }

    /// Detach the viewer now; true if that tore the stream down
    pub(crate) async fn release(&mut self) -> Result<bool, RegistryError> {
        let result = self.registry.detach_viewer(&self.key, self.id).await;
        self.armed = false;
        result
    }
}

impl<C: UpstreamConnector> Drop for ViewerLease<C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let key = self.key.clone();
        let id = self.id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = registry.detach_viewer(&key, id).await {
                        tracing::debug!(viewer = %id, error = %e, "Deferred detach after teardown");
                    }
                });
                tracing::debug!(stream = %self.key, viewer = %self.id, "Pipeline dropped, detach deferred");
            }
            Err(_) => {
                tracing::warn!(stream = %self.key, viewer = %self.id, "Pipeline dropped outside a runtime, viewer left attached");
            }
        }
    }
}
