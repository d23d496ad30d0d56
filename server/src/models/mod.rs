//! Data models for the FlightSurety relay

pub mod ledger;
pub mod oracle;

pub use ledger::{LedgerEvent, RefundRecord, RelayMessage, StatusInfo, WithdrawRecord};
pub use oracle::{
    FanOutReport, FlightStatusCode, Oracle, OracleRequest, OracleResponseSubmission,
    SubmissionFailure,
};
