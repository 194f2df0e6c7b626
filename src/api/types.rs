//! Shared types for the API layer.

use std::sync::Arc;

use crate::notify::Notifier;
use crate::orchestrator::QueueOrchestrator;
use crate::triage::UrgencyClassifier;

/// Shared context for all API routes: the orchestrator, the observer
/// channel, and the urgency classifier. Constructed once at startup and
/// cloned into every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub orchestrator: Arc<QueueOrchestrator>,
    pub notifier: Notifier,
    pub classifier: Arc<UrgencyClassifier>,
}

impl ApiContext {
    pub fn new(
        orchestrator: Arc<QueueOrchestrator>,
        classifier: Arc<UrgencyClassifier>,
    ) -> Self {
        let notifier = orchestrator.notifier().clone();
        Self {
            orchestrator,
            notifier,
            classifier,
        }
    }
}
