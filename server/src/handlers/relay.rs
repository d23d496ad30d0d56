use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::{RefundRecord, RelayMessage, StatusInfo, WithdrawRecord};
use crate::services::EventLedger;

pub async fn api_root() -> Json<RelayMessage<&'static str>> {
    Json(RelayMessage::new("An API for use with your Dapp!"))
}

/// Latest flight status, `null` until one has been reported.
pub async fn get_status(
    State(ledger): State<Arc<EventLedger>>,
) -> Json<RelayMessage<Option<StatusInfo>>> {
    Json(RelayMessage::new(ledger.status().await))
}

pub async fn get_refunds(
    State(ledger): State<Arc<EventLedger>>,
) -> Json<RelayMessage<Vec<RefundRecord>>> {
    Json(RelayMessage::new(ledger.refunds().await))
}

pub async fn get_withdraws(
    State(ledger): State<Arc<EventLedger>>,
) -> Json<RelayMessage<Vec<WithdrawRecord>>> {
    Json(RelayMessage::new(ledger.withdraws().await))
}
