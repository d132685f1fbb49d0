use std::sync::Arc;

use common::config::Settings;
use common::history::HistoryStore;
use common::jobs::JobRegistry;
use common::scheduler::Dispatcher;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub history: Arc<HistoryStore>,
    pub dispatcher: Dispatcher,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        registry: Arc<JobRegistry>,
        history: Arc<HistoryStore>,
        dispatcher: Dispatcher,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            history,
            dispatcher,
            settings: Arc::new(settings),
        }
    }
}
