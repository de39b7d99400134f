use std::sync::Arc;

use crate::core::config::Settings;
use crate::services::grading_backend::GradingBackend;
use crate::services::session_registry::SessionRegistry;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    sessions: Arc<SessionRegistry>,
    backend: Arc<dyn GradingBackend>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, backend: Arc<dyn GradingBackend>) -> Self {
        let sessions = Arc::new(SessionRegistry::new(settings.exam().max_active_sessions));
        Self { inner: Arc::new(InnerState { settings, sessions, backend }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.inner.sessions
    }

    pub(crate) fn backend(&self) -> Arc<dyn GradingBackend> {
        Arc::clone(&self.inner.backend)
    }
}
