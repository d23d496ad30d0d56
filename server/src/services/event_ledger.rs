//! In-memory log of refund, withdraw and flight status events.

use chrono::Utc;
use ethers::types::{Address, U256};
use tokio::sync::{broadcast, RwLock};

use crate::models::{FlightStatusCode, LedgerEvent, RefundRecord, StatusInfo, WithdrawRecord};

const SUBSCRIBER_BUFFER: usize = 256;

#[derive(Default)]
struct LedgerState {
    refunds: Vec<RefundRecord>,
    withdraws: Vec<WithdrawRecord>,
    status: Option<StatusInfo>,
}

/// Refund and withdraw logs are append-only and kept in arrival order; the
/// status slot only holds the latest report. Every change is also pushed to
/// live subscribers.
pub struct EventLedger {
    state: RwLock<LedgerState>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLedger {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            state: RwLock::new(LedgerState::default()),
            events,
        }
    }

    pub async fn record_refund(
        &self,
        passenger_id: Address,
        flight_code: String,
        amount: U256,
    ) -> RefundRecord {
        let record = RefundRecord {
            timestamp: Utc::now().timestamp_millis(),
            flight_code,
            passenger_id,
            amount: wei(amount),
        };

        self.state.write().await.refunds.push(record.clone());
        self.publish(LedgerEvent::Refund(record.clone()));
        record
    }

    pub async fn record_withdraw(&self, passenger_id: Address, amount: U256) -> WithdrawRecord {
        let record = WithdrawRecord {
            timestamp: Utc::now().timestamp_millis(),
            passenger_id,
            amount: wei(amount),
        };

        self.state.write().await.withdraws.push(record.clone());
        self.publish(LedgerEvent::Withdraw(record.clone()));
        record
    }

    pub async fn record_status(&self, flight_code: String, status: FlightStatusCode) -> StatusInfo {
        let info = StatusInfo::new(flight_code, status);
        self.state.write().await.status = Some(info.clone());
        self.publish(LedgerEvent::Status(info.clone()));
        info
    }

    pub async fn refunds(&self) -> Vec<RefundRecord> {
        self.state.read().await.refunds.clone()
    }

    pub async fn withdraws(&self) -> Vec<WithdrawRecord> {
        self.state.read().await.withdraws.clone()
    }

    pub async fn status(&self) -> Option<StatusInfo> {
        self.state.read().await.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: LedgerEvent) {
        // No subscribers is the normal idle case.
        let _ = self.events.send(event);
    }
}

/// Amounts above `u128::MAX` wei are clamped; no real balance gets there.
fn wei(amount: U256) -> u128 {
    if amount > U256::from(u128::MAX) {
        tracing::warn!(%amount, "amount exceeds u128, clamping");
        return u128::MAX;
    }
    amount.as_u128()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refunds_keep_arrival_order() {
        let ledger = EventLedger::new();
        let passenger = Address::repeat_byte(0xaa);

        for (flight, amount) in [("FLIGHT 1", 1u64), ("FLIGHT 2", 2), ("FLIGHT 3", 3)] {
            ledger
                .record_refund(passenger, flight.to_string(), U256::from(amount))
                .await;
        }

        let flights: Vec<String> = ledger
            .refunds()
            .await
            .into_iter()
            .map(|refund| refund.flight_code)
            .collect();
        assert_eq!(flights, vec!["FLIGHT 1", "FLIGHT 2", "FLIGHT 3"]);
    }

    #[tokio::test]
    async fn duplicates_are_not_collapsed() {
        let ledger = EventLedger::new();
        let passenger = Address::repeat_byte(0xaa);

        ledger.record_withdraw(passenger, U256::from(7u64)).await;
        ledger.record_withdraw(passenger, U256::from(7u64)).await;

        assert_eq!(ledger.withdraws().await.len(), 2);
    }

    #[tokio::test]
    async fn status_is_overwritten_not_appended() {
        let ledger = EventLedger::new();
        assert_eq!(ledger.status().await, None);

        ledger
            .record_status("FLIGHT 1".to_string(), FlightStatusCode::OnTime)
            .await;
        ledger
            .record_status("FLIGHT 2".to_string(), FlightStatusCode::LateWeather)
            .await;

        let status = ledger.status().await.unwrap();
        assert_eq!(status.flight_code, "FLIGHT 2");
        assert_eq!(status.status, FlightStatusCode::LateWeather);
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let ledger = EventLedger::new();
        let mut events = ledger.subscribe();
        let passenger = Address::repeat_byte(0xaa);

        let refund = ledger
            .record_refund(passenger, "FLIGHT 1234".to_string(), U256::from(5u64))
            .await;
        let status = ledger
            .record_status("FLIGHT 1234".to_string(), FlightStatusCode::LateAirline)
            .await;

        assert_eq!(events.recv().await.unwrap(), LedgerEvent::Refund(refund));
        assert_eq!(events.recv().await.unwrap(), LedgerEvent::Status(status));
    }

    #[test]
    fn large_amounts_are_kept_exact() {
        let amount = U256::from(5_000_000_000_000_000_000u64);
        assert_eq!(wei(amount), 5_000_000_000_000_000_000u128);
        assert_eq!(wei(U256::MAX), u128::MAX);
    }
}
