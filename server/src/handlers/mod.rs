//! API handlers for the FlightSurety relay

mod relay;
mod ws;

pub use relay::{api_root, get_refunds, get_status, get_withdraws};
pub use ws::ledger_socket;
