pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

use auth::{ApiKey, ServiceIdentity};
use store::SharedStore;

/// Shared application state available to all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub api_key: ApiKey,
    pub service: ServiceIdentity,
}

impl axum::extract::FromRef<AppState> for SharedStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}
