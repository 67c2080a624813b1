use std::sync::Arc;

use axum::extract::FromRef;

use crate::{config::Config, store::QuizStore, utils::clock::Clock};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuizStore>,
    pub config: Config,
    pub clock: Arc<dyn Clock>,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
