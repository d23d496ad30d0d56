use std::collections::HashSet;

use ethers::types::Address;

use crate::models::RefundRecord;

/// Remembers which refunds the passenger has already been told about.
///
/// A refund is identified by relay timestamp, flight code and passenger, so
/// a record fetched twice is only announced once.
#[derive(Debug, Default)]
pub struct RefundNotices {
    seen: HashSet<String>,
}

impl RefundNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refunds for `passenger` on `flight_code` that were not returned by an
    /// earlier call, marking them as seen.
    pub fn unseen(
        &mut self,
        passenger: Address,
        flight_code: &str,
        refunds: &[RefundRecord],
    ) -> Vec<RefundRecord> {
        refunds
            .iter()
            .filter(|refund| refund.passenger_id == passenger && refund.flight_code == flight_code)
            .filter(|refund| self.seen.insert(notice_key(refund.timestamp, flight_code, passenger)))
            .cloned()
            .collect()
    }
}

fn notice_key(timestamp: i64, flight_code: &str, passenger: Address) -> String {
    format!("{timestamp}{flight_code}{passenger:?}")
}
