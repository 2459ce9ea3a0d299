//! Application state.

use std::sync::Arc;

use crate::config::Config;
use crate::gemini::VideoModel;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub model: Arc<dyn VideoModel>,
}

impl AppState {
    pub fn new(config: Config, model: Arc<dyn VideoModel>) -> Self {
        Self {
            config: Arc::new(config),
            model,
        }
    }
}
