use std::fmt;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Flight status codes understood by the FlightSurety app contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightStatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl FlightStatusCode {
    pub const ALL: [FlightStatusCode; 6] = [
        FlightStatusCode::Unknown,
        FlightStatusCode::OnTime,
        FlightStatusCode::LateAirline,
        FlightStatusCode::LateWeather,
        FlightStatusCode::LateTechnical,
        FlightStatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            FlightStatusCode::Unknown => 0,
            FlightStatusCode::OnTime => 10,
            FlightStatusCode::LateAirline => 20,
            FlightStatusCode::LateWeather => 30,
            FlightStatusCode::LateTechnical => 40,
            FlightStatusCode::LateOther => 50,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            FlightStatusCode::Unknown => "UNKNOWN",
            FlightStatusCode::OnTime => "ON_TIME",
            FlightStatusCode::LateAirline => "LATE_AIRLINE",
            FlightStatusCode::LateWeather => "LATE_WEATHER",
            FlightStatusCode::LateTechnical => "LATE_TECHNICAL",
            FlightStatusCode::LateOther => "LATE_OTHER",
        }
    }
}

impl fmt::Display for FlightStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A registered oracle and the three indexes the contract assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Oracle {
    pub address: Address,
    pub indexes: [u8; 3],
}

impl Oracle {
    pub fn serves(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Emitted by the app contract when it wants oracles holding `index` to report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub index: u8,
    pub flight_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleResponseSubmission {
    pub index: u8,
    pub flight_code: String,
    pub status_code: FlightStatusCode,
}

/// A submission the chain (or the transport) rejected.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionFailure {
    pub oracle: Address,
    pub error: String,
}

/// Outcome of answering one oracle request.
#[derive(Debug, Clone, Serialize)]
pub struct FanOutReport {
    pub request: OracleRequest,
    pub attempted: usize,
    pub failures: Vec<SubmissionFailure>,
}

impl FanOutReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}
