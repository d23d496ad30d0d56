//! Access to the FlightSurety contracts on an Ethereum node.
//!
//! [`ChainClient`] is the seam between the relay/dapp logic and the node. The
//! production implementation is [`RpcChainClient`], which speaks plain
//! JSON-RPC over `reqwest` and leaves key management to the node (transactions
//! are sent from unlocked accounts).

pub mod abi;
mod rpc;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use thiserror::Error;

use crate::models::{FlightStatusCode, OracleRequest, OracleResponseSubmission};

pub use rpc::RpcChainClient;

pub type TxHash = H256;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transaction {0:?} reverted")]
    Reverted(TxHash),

    #[error("no receipt for transaction {0:?}")]
    ReceiptTimeout(TxHash),

    #[error("malformed chain response: {0}")]
    Decode(String),
}

/// Refund credited by the app contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundEvent {
    pub passenger_id: Address,
    pub flight_code: String,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawEvent {
    pub passenger_id: Address,
    pub amount: U256,
}

/// Decoded app contract event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    OracleRequest(OracleRequest),
    OracleReport {
        flight_code: String,
        status_code: u8,
    },
    Refund(RefundEvent),
    Withdraw(WithdrawEvent),
    Log(String),
    FlightStatusInfo {
        flight_code: String,
        status: FlightStatusCode,
    },
}

/// An event together with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub block_number: u64,
    pub tx_hash: Option<TxHash>,
    pub event: ContractEvent,
}

/// Calls and events of the FlightSurety app and data contracts.
///
/// Every `send` style method resolves once the transaction has a successful
/// receipt; a reverted transaction is reported as [`ChainError::Reverted`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError>;

    async fn is_operational(&self, from: Address) -> Result<bool, ChainError>;

    async fn register_oracle(&self, from: Address, stake: U256) -> Result<TxHash, ChainError>;

    async fn get_my_indexes(&self, from: Address) -> Result<[u8; 3], ChainError>;

    async fn submit_oracle_response(
        &self,
        from: Address,
        submission: &OracleResponseSubmission,
    ) -> Result<TxHash, ChainError>;

    async fn fetch_flight_status(
        &self,
        from: Address,
        flight_code: &str,
    ) -> Result<TxHash, ChainError>;

    async fn buy_insurance(
        &self,
        from: Address,
        flight_code: &str,
        value: U256,
    ) -> Result<TxHash, ChainError>;

    async fn withdraw(&self, from: Address) -> Result<TxHash, ChainError>;

    async fn authorize_caller(&self, from: Address, caller: Address)
        -> Result<TxHash, ChainError>;

    async fn register_airline(
        &self,
        from: Address,
        name: &str,
        airline: Address,
    ) -> Result<TxHash, ChainError>;

    async fn submit_funds(&self, from: Address, value: U256) -> Result<TxHash, ChainError>;

    async fn register_flight(
        &self,
        from: Address,
        flight_code: &str,
        timestamp: u64,
    ) -> Result<TxHash, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// App contract events in the inclusive block range, in chain order.
    async fn events(&self, from_block: u64, to_block: u64)
        -> Result<Vec<ChainEvent>, ChainError>;
}
