//! In-memory [`ChainClient`] used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};

use super::{ChainClient, ChainError, ChainEvent, TxHash};
use crate::models::OracleResponseSubmission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentCall {
    RegisterOracle { from: Address, stake: U256 },
    FetchFlightStatus { from: Address, flight_code: String },
    BuyInsurance { from: Address, flight_code: String, value: U256 },
    Withdraw { from: Address },
    AuthorizeCaller { from: Address, caller: Address },
    RegisterAirline { from: Address, name: String, airline: Address },
    SubmitFunds { from: Address, value: U256 },
    RegisterFlight { from: Address, flight_code: String },
}

#[derive(Default)]
struct MockState {
    accounts: Vec<Address>,
    indexes: HashMap<Address, [u8; 3]>,
    reverting: HashSet<Address>,
    timing_out: HashSet<Address>,
    panicking: HashSet<Address>,
    submissions: Vec<(Address, OracleResponseSubmission)>,
    sent: Vec<SentCall>,
    events: Vec<ChainEvent>,
    head: u64,
    failing_polls: u32,
    nonce: u64,
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(count: u8) -> Self {
        let chain = Self::new();
        chain.state.lock().unwrap().accounts = (1..=count).map(Address::repeat_byte).collect();
        chain
    }

    pub fn accounts_now(&self) -> Vec<Address> {
        self.state.lock().unwrap().accounts.clone()
    }

    /// Indexes `getMyIndexes` returns for `oracle` once it has registered.
    pub fn assign_indexes(&self, oracle: Address, indexes: [u8; 3]) {
        self.state.lock().unwrap().indexes.insert(oracle, indexes);
    }

    /// Every transaction sent from `account` reverts.
    pub fn revert_from(&self, account: Address) {
        self.state.lock().unwrap().reverting.insert(account);
    }

    /// Every transaction sent from `account` is accepted but its receipt
    /// never shows up in time.
    pub fn time_out_from(&self, account: Address) {
        self.state.lock().unwrap().timing_out.insert(account);
    }

    /// Oracle responses submitted from `account` panic.
    pub fn panic_from(&self, account: Address) {
        self.state.lock().unwrap().panicking.insert(account);
    }

    pub fn submissions(&self) -> Vec<(Address, OracleResponseSubmission)> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn sent(&self) -> Vec<SentCall> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn push_event(&self, event: ChainEvent) {
        let mut state = self.state.lock().unwrap();
        state.head = state.head.max(event.block_number);
        state.events.push(event);
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    /// The next `count` calls to `events` fail.
    pub fn fail_polls(&self, count: u32) {
        self.state.lock().unwrap().failing_polls = count;
    }

    fn transact(&self, from: Address, call: Option<SentCall>) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.nonce += 1;
        let tx_hash = H256::from_low_u64_be(state.nonce);
        if state.reverting.contains(&from) {
            return Err(ChainError::Reverted(tx_hash));
        }
        if let Some(call) = call {
            state.sent.push(call);
        }
        if state.timing_out.contains(&from) {
            return Err(ChainError::ReceiptTimeout(tx_hash));
        }
        Ok(tx_hash)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        Ok(self.accounts_now())
    }

    async fn is_operational(&self, _from: Address) -> Result<bool, ChainError> {
        Ok(true)
    }

    async fn register_oracle(&self, from: Address, stake: U256) -> Result<TxHash, ChainError> {
        self.transact(from, Some(SentCall::RegisterOracle { from, stake }))
    }

    async fn get_my_indexes(&self, from: Address) -> Result<[u8; 3], ChainError> {
        self.state
            .lock()
            .unwrap()
            .indexes
            .get(&from)
            .copied()
            .ok_or(ChainError::Rpc {
                code: -32000,
                message: "Not registered as an oracle".to_string(),
            })
    }

    async fn submit_oracle_response(
        &self,
        from: Address,
        submission: &OracleResponseSubmission,
    ) -> Result<TxHash, ChainError> {
        let panics = self.state.lock().unwrap().panicking.contains(&from);
        if panics {
            panic!("submission from {from:?} blew up");
        }
        let tx_hash = self.transact(from, None)?;
        self.state
            .lock()
            .unwrap()
            .submissions
            .push((from, submission.clone()));
        Ok(tx_hash)
    }

    async fn fetch_flight_status(
        &self,
        from: Address,
        flight_code: &str,
    ) -> Result<TxHash, ChainError> {
        let call = SentCall::FetchFlightStatus {
            from,
            flight_code: flight_code.to_string(),
        };
        self.transact(from, Some(call))
    }

    async fn buy_insurance(
        &self,
        from: Address,
        flight_code: &str,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let call = SentCall::BuyInsurance {
            from,
            flight_code: flight_code.to_string(),
            value,
        };
        self.transact(from, Some(call))
    }

    async fn withdraw(&self, from: Address) -> Result<TxHash, ChainError> {
        self.transact(from, Some(SentCall::Withdraw { from }))
    }

    async fn authorize_caller(
        &self,
        from: Address,
        caller: Address,
    ) -> Result<TxHash, ChainError> {
        self.transact(from, Some(SentCall::AuthorizeCaller { from, caller }))
    }

    async fn register_airline(
        &self,
        from: Address,
        name: &str,
        airline: Address,
    ) -> Result<TxHash, ChainError> {
        let call = SentCall::RegisterAirline {
            from,
            name: name.to_string(),
            airline,
        };
        self.transact(from, Some(call))
    }

    async fn submit_funds(&self, from: Address, value: U256) -> Result<TxHash, ChainError> {
        self.transact(from, Some(SentCall::SubmitFunds { from, value }))
    }

    async fn register_flight(
        &self,
        from: Address,
        flight_code: &str,
        _timestamp: u64,
    ) -> Result<TxHash, ChainError> {
        let call = SentCall::RegisterFlight {
            from,
            flight_code: flight_code.to_string(),
        };
        self.transact(from, Some(call))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>, ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_polls > 0 {
            state.failing_polls -= 1;
            return Err(ChainError::Rpc {
                code: -32603,
                message: "node unavailable".to_string(),
            });
        }

        Ok(state
            .events
            .iter()
            .filter(|event| (from_block..=to_block).contains(&event.block_number))
            .cloned()
            .collect())
    }
}
