//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::services::EventLedger;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<EventLedger>,
}

impl AppState {
    pub fn new(ledger: Arc<EventLedger>) -> Self {
        Self { ledger }
    }
}

impl FromRef<AppState> for Arc<EventLedger> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ledger.clone()
    }
}
