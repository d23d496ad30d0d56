//! Event listener for FlightSurety app contract events

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::chain::{ChainClient, ChainError, ChainEvent, ContractEvent};
use crate::models::FanOutReport;
use crate::services::{EventLedger, OracleResponder};

/// Upper bound on the block range fetched per poll.
const MAX_BLOCKS_PER_POLL: u64 = 200;

#[derive(Debug, Default)]
struct Cursor {
    /// Next block to fetch. `None` until the first poll pins it to the head.
    next_block: Option<u64>,
    /// First block mined after the listener started. Oracle requests from
    /// earlier blocks are replayed history and are not answered again.
    live_from: Option<u64>,
}

pub struct EventListener {
    chain: Arc<dyn ChainClient>,
    responder: Arc<OracleResponder>,
    ledger: Arc<EventLedger>,
    poll_interval: Duration,
    cursor: Mutex<Cursor>,
}

impl EventListener {
    /// Without `replay_from` the listener only sees events mined after its
    /// first poll. With it, older refund, withdraw and status events are
    /// replayed into the ledger.
    pub fn new(
        chain: Arc<dyn ChainClient>,
        responder: Arc<OracleResponder>,
        ledger: Arc<EventLedger>,
        poll_interval: Duration,
        replay_from: Option<u64>,
    ) -> Self {
        Self {
            chain,
            responder,
            ledger,
            poll_interval,
            cursor: Mutex::new(Cursor {
                next_block: replay_from,
                live_from: None,
            }),
        }
    }

    pub async fn start(self: Arc<Self>) {
        info!("Starting FlightSurety event listener");

        loop {
            if let Err(err) = self.poll_once().await {
                error!(error = %err, "event poll cycle failed");
            }

            sleep(self.poll_interval).await;
        }
    }

    /// Fetches and dispatches the next batch of events. Oracle requests are
    /// answered in spawned tasks whose handles are returned; the cursor only
    /// moves once the whole batch was fetched.
    pub async fn poll_once(&self) -> Result<Vec<JoinHandle<FanOutReport>>, ChainError> {
        let head = self.chain.block_number().await?;

        let mut cursor = self.cursor.lock().await;
        let live_from = *cursor.live_from.get_or_insert(head.saturating_add(1));
        let Some(from_block) = cursor.next_block else {
            info!(block = head, "event listener pinned to chain head");
            cursor.next_block = Some(live_from);
            return Ok(Vec::new());
        };

        if from_block > head {
            return Ok(Vec::new());
        }

        let to_block = head.min(from_block + MAX_BLOCKS_PER_POLL - 1);
        let events = self.chain.events(from_block, to_block).await?;

        let mut fan_outs = Vec::new();
        for event in &events {
            let live = event.block_number >= live_from;
            if let Some(handle) = self.dispatch(event, live).await {
                fan_outs.push(handle);
            }
        }

        cursor.next_block = Some(to_block + 1);
        debug!(from_block, to_block, events = events.len(), "event poll cycle complete");

        Ok(fan_outs)
    }

    async fn dispatch(
        &self,
        chain_event: &ChainEvent,
        live: bool,
    ) -> Option<JoinHandle<FanOutReport>> {
        match &chain_event.event {
            ContractEvent::OracleRequest(request) => {
                info!(
                    index = request.index,
                    flight_code = %request.flight_code,
                    block = chain_event.block_number,
                    "ORACLE REQUEST"
                );
                if !live {
                    debug!(
                        block = chain_event.block_number,
                        "replayed oracle request not answered"
                    );
                    return None;
                }
                let responder = self.responder.clone();
                let request = request.clone();
                return Some(tokio::spawn(async move { responder.respond(request).await }));
            }
            ContractEvent::OracleReport {
                flight_code,
                status_code,
            } => {
                info!(%flight_code, status_code, "ORACLE REPORT");
            }
            ContractEvent::Refund(refund) => {
                info!(
                    passenger = ?refund.passenger_id,
                    flight_code = %refund.flight_code,
                    amount = %refund.amount,
                    "REFUND"
                );
                self.ledger
                    .record_refund(refund.passenger_id, refund.flight_code.clone(), refund.amount)
                    .await;
            }
            ContractEvent::Withdraw(withdraw) => {
                info!(
                    passenger = ?withdraw.passenger_id,
                    amount = %withdraw.amount,
                    "WITHDRAW"
                );
                self.ledger
                    .record_withdraw(withdraw.passenger_id, withdraw.amount)
                    .await;
            }
            ContractEvent::Log(message) => {
                info!(%message, "LOG");
            }
            ContractEvent::FlightStatusInfo {
                flight_code,
                status,
            } => {
                info!(%flight_code, %status, "FlightStatusInfo");
                self.ledger.record_status(flight_code.clone(), *status).await;
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::chain::RefundEvent;
    use crate::models::{FlightStatusCode, OracleRequest};
    use crate::services::{FixedStatusPolicy, OracleRegistry};
    use ethers::types::{Address, U256};

    struct Harness {
        chain: Arc<MockChain>,
        ledger: Arc<EventLedger>,
        listener: EventListener,
    }

    async fn harness(replay_from: Option<u64>) -> Harness {
        let chain = Arc::new(MockChain::new());
        let registry = Arc::new(OracleRegistry::new(chain.clone(), U256::one()));
        for (byte, indexes) in [(0xa0u8, [1, 4, 7]), (0xb0, [2, 4, 9])] {
            let oracle = Address::repeat_byte(byte);
            chain.assign_indexes(oracle, indexes);
            registry.register(oracle).await.unwrap();
        }

        let responder = Arc::new(OracleResponder::new(
            chain.clone(),
            registry,
            Arc::new(FixedStatusPolicy(FlightStatusCode::LateAirline)),
        ));
        let ledger = Arc::new(EventLedger::new());
        let listener = EventListener::new(
            chain.clone(),
            responder,
            ledger.clone(),
            Duration::from_millis(10),
            replay_from,
        );

        Harness {
            chain,
            ledger,
            listener,
        }
    }

    fn at_block(block_number: u64, event: ContractEvent) -> ChainEvent {
        ChainEvent {
            block_number,
            tx_hash: None,
            event,
        }
    }

    #[tokio::test]
    async fn first_poll_starts_at_head_without_replay() {
        let h = harness(None).await;
        h.chain.push_event(at_block(
            3,
            ContractEvent::Log("mined before start".to_string()),
        ));
        h.chain.push_event(at_block(
            3,
            ContractEvent::Refund(RefundEvent {
                passenger_id: Address::repeat_byte(0xaa),
                flight_code: "FLIGHT 1".to_string(),
                amount: U256::from(1u64),
            }),
        ));

        h.listener.poll_once().await.unwrap();
        assert!(h.ledger.refunds().await.is_empty());

        h.chain.push_event(at_block(
            4,
            ContractEvent::Refund(RefundEvent {
                passenger_id: Address::repeat_byte(0xaa),
                flight_code: "FLIGHT 2".to_string(),
                amount: U256::from(2u64),
            }),
        ));
        h.listener.poll_once().await.unwrap();

        let refunds = h.ledger.refunds().await;
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].flight_code, "FLIGHT 2");
    }

    #[tokio::test]
    async fn replay_picks_up_history() {
        let h = harness(Some(0)).await;
        h.chain.push_event(at_block(
            2,
            ContractEvent::FlightStatusInfo {
                flight_code: "FLIGHT 1234".to_string(),
                status: FlightStatusCode::LateAirline,
            },
        ));

        h.listener.poll_once().await.unwrap();

        let status = h.ledger.status().await.unwrap();
        assert_eq!(status.flight_code, "FLIGHT 1234");
    }

    #[tokio::test]
    async fn oracle_request_fans_out_to_matching_oracles() {
        let h = harness(Some(0)).await;
        h.listener.poll_once().await.unwrap();
        h.chain.push_event(at_block(
            1,
            ContractEvent::OracleRequest(OracleRequest {
                index: 4,
                flight_code: "FLIGHT 1234".to_string(),
            }),
        ));

        let fan_outs = h.listener.poll_once().await.unwrap();
        assert_eq!(fan_outs.len(), 1);
        for handle in fan_outs {
            let report = handle.await.unwrap();
            assert_eq!(report.attempted, 2);
        }

        let submissions = h.chain.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions
            .iter()
            .all(|(_, submission)| submission.flight_code == "FLIGHT 1234"));
    }

    #[tokio::test]
    async fn replayed_oracle_requests_are_not_answered() {
        let h = harness(Some(0)).await;
        h.chain.push_event(at_block(
            2,
            ContractEvent::OracleRequest(OracleRequest {
                index: 4,
                flight_code: "FLIGHT 1111".to_string(),
            }),
        ));
        h.chain.push_event(at_block(
            2,
            ContractEvent::Refund(RefundEvent {
                passenger_id: Address::repeat_byte(0xaa),
                flight_code: "FLIGHT 1111".to_string(),
                amount: U256::from(1u64),
            }),
        ));

        let fan_outs = h.listener.poll_once().await.unwrap();
        assert!(fan_outs.is_empty());
        assert_eq!(h.ledger.refunds().await.len(), 1);

        h.chain.push_event(at_block(
            3,
            ContractEvent::OracleRequest(OracleRequest {
                index: 4,
                flight_code: "FLIGHT 2222".to_string(),
            }),
        ));
        let fan_outs = h.listener.poll_once().await.unwrap();
        assert_eq!(fan_outs.len(), 1);
        for handle in fan_outs {
            handle.await.unwrap();
        }

        let submissions = h.chain.submissions();
        assert_eq!(submissions.len(), 2);
        assert!(submissions
            .iter()
            .all(|(_, submission)| submission.flight_code == "FLIGHT 2222"));
    }

    #[tokio::test]
    async fn failed_poll_retries_the_same_range() {
        let h = harness(Some(0)).await;
        h.chain.push_event(at_block(
            1,
            ContractEvent::Refund(RefundEvent {
                passenger_id: Address::repeat_byte(0xaa),
                flight_code: "FLIGHT 1234".to_string(),
                amount: U256::from(5_000_000_000_000_000_000u64),
            }),
        ));
        h.chain.fail_polls(1);

        assert!(h.listener.poll_once().await.is_err());
        assert!(h.ledger.refunds().await.is_empty());

        h.listener.poll_once().await.unwrap();
        let refunds = h.ledger.refunds().await;
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].amount, 5_000_000_000_000_000_000u128);
    }

    #[tokio::test]
    async fn idle_chain_is_a_no_op() {
        let h = harness(None).await;
        h.chain.set_head(10);

        h.listener.poll_once().await.unwrap();
        let fan_outs = h.listener.poll_once().await.unwrap();

        assert!(fan_outs.is_empty());
        assert!(h.ledger.refunds().await.is_empty());
    }
}
