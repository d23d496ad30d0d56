use std::fmt;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use super::oracle::FlightStatusCode;

/// A payout credited to a passenger after a late-airline status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRecord {
    /// Relay receipt time, Unix milliseconds.
    pub timestamp: i64,
    pub flight_code: String,
    #[serde(rename = "passengerID")]
    pub passenger_id: Address,
    /// Wei.
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRecord {
    pub timestamp: i64,
    #[serde(rename = "passengerID")]
    pub passenger_id: Address,
    pub amount: u128,
}

/// Latest flight status reported by the app contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub flight_code: String,
    pub status_code: u8,
    pub status: FlightStatusCode,
}

impl StatusInfo {
    pub fn new(flight_code: String, status: FlightStatusCode) -> Self {
        Self {
            flight_code,
            status_code: status.code(),
            status,
        }
    }
}

impl fmt::Display for StatusInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - status: {}", self.flight_code, self.status)
    }
}

/// Change notification pushed to live relay subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum LedgerEvent {
    Refund(RefundRecord),
    Withdraw(WithdrawRecord),
    Status(StatusInfo),
}

/// Envelope used by every relay route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayMessage<T> {
    pub message: T,
}

impl<T> RelayMessage<T> {
    pub fn new(message: T) -> Self {
        Self { message }
    }
}
