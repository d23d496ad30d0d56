//! Relay services: oracle bookkeeping, oracle responses and the event ledger.

pub mod event_ledger;
pub mod oracle_registry;
pub mod oracle_responder;

pub use event_ledger::EventLedger;
pub use oracle_registry::OracleRegistry;
pub use oracle_responder::{FixedStatusPolicy, OracleResponder, RandomStatusPolicy, StatusPolicy};
