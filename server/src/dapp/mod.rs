//! Front-end controller for the FlightSurety dapp.
//!
//! Seeds the demo airlines, flights and passengers, then maps the passenger
//! actions (buy insurance, request a flight status, withdraw) onto contract
//! calls and reads their outcome back from the relay. Instead of guessing how
//! long the oracle round trip takes, each action subscribes to the relay's
//! push channel before sending and waits for the matching event, bounded by
//! the settle timeout; the relay is then read over HTTP either way.

mod notices;
mod relay_client;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ethers::types::{Address, U256};
use ethers::utils::parse_ether;
use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{ChainClient, ChainError, TxHash};
use crate::models::{LedgerEvent, RefundRecord, StatusInfo, WithdrawRecord};

pub use notices::RefundNotices;
pub use relay_client::{LedgerWatch, RelayClient, RelayError};

const MIN_ACCOUNTS: usize = 10;
const DEMO_FLIGHTS: usize = 10;
const AIRLINE_FUNDING_ETHER: &str = "11";

#[derive(Debug, Error)]
pub enum DappError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error("the node exposes {0} accounts, at least 10 are needed")]
    NotEnoughAccounts(usize),

    #[error("accounts have not been loaded")]
    NotInitialized,

    #[error("no passenger at index {0}")]
    UnknownPassenger(usize),

    #[error("invalid ether amount {0:?}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flight {
    pub code: String,
    pub timestamp: u64,
    pub airline: Address,
    pub airline_name: String,
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// App contract, authorized as a caller of the data contract on seeding.
    pub app_address: Address,
    /// Airline registered by the data contract's constructor.
    pub first_airline: Address,
    /// Upper bound on waiting for an action's outcome event.
    pub settle_timeout: Duration,
}

/// What a status request produced for the selected passenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: Option<StatusInfo>,
    pub new_refunds: Vec<RefundRecord>,
}

pub struct FrontEndController {
    chain: Arc<dyn ChainClient>,
    relay: RelayClient,
    settings: ControllerSettings,
    owner: Option<Address>,
    airlines: Vec<Address>,
    passengers: Vec<Address>,
    flights: Vec<Flight>,
    selected_passenger: usize,
    notices: RefundNotices,
}

impl FrontEndController {
    pub fn new(chain: Arc<dyn ChainClient>, relay: RelayClient, settings: ControllerSettings) -> Self {
        Self {
            chain,
            relay,
            settings,
            owner: None,
            airlines: Vec::new(),
            passengers: Vec::new(),
            flights: Vec::new(),
            selected_passenger: 0,
            notices: RefundNotices::new(),
        }
    }

    /// Assigns roles from the node's accounts: `0` owns the contracts, `2..5`
    /// are airlines next to the first airline, `5..10` are passengers.
    pub async fn load_accounts(&mut self) -> Result<(), DappError> {
        let accounts = self.chain.accounts().await?;
        if accounts.len() < MIN_ACCOUNTS {
            return Err(DappError::NotEnoughAccounts(accounts.len()));
        }

        self.owner = Some(accounts[0]);
        self.airlines = vec![self.settings.first_airline, accounts[2], accounts[3], accounts[4]];
        self.passengers = accounts[5..10].to_vec();
        Ok(())
    }

    /// Loads accounts and seeds the demo airlines and flights.
    pub async fn initialize(&mut self) -> Result<(), DappError> {
        self.load_accounts().await?;
        let owner = self.owner()?;

        info!("Authorizing Caller");
        self.chain
            .authorize_caller(owner, self.settings.app_address)
            .await?;

        self.insert_airlines().await;
        self.insert_flights().await;
        Ok(())
    }

    async fn insert_airlines(&self) {
        let first_airline = self.settings.first_airline;
        let funding = match parse_ether(AIRLINE_FUNDING_ETHER) {
            Ok(funding) => funding,
            Err(err) => {
                warn!(error = %err, "invalid airline funding amount");
                return;
            }
        };

        for (i, airline) in self.airlines.iter().enumerate().skip(1) {
            let name = format!("Airline{i}");
            if let Err(err) = self.chain.register_airline(first_airline, &name, *airline).await {
                warn!(airline = ?airline, error = %err, "registerAirline failed");
                continue;
            }

            if let Err(err) = self.chain.submit_funds(*airline, funding).await {
                warn!(airline = ?airline, error = %err, "submitFunds failed");
            }
        }
    }

    async fn insert_flights(&mut self) {
        for i in 0..DEMO_FLIGHTS {
            let code = format!("FLIGHT {}", rand::thread_rng().gen_range(1000..10000));
            let timestamp = Utc::now().timestamp().max(0) as u64;
            let airline = self.airlines[i % self.airlines.len()];

            match self.chain.register_flight(airline, &code, timestamp).await {
                Ok(_) => {
                    info!(flight = %code, timestamp, airline = ?airline, "Registering Flight");
                    self.flights.push(Flight {
                        code,
                        timestamp,
                        airline,
                        airline_name: format!("Airline{}", i % self.airlines.len()),
                    });
                }
                Err(err) => warn!(flight = %code, error = %err, "registerFlight failed"),
            }
        }
    }

    pub fn flights(&self) -> &[Flight] {
        &self.flights
    }

    pub fn passengers(&self) -> &[Address] {
        &self.passengers
    }

    pub fn select_passenger(&mut self, index: usize) -> Result<Address, DappError> {
        let passenger = *self
            .passengers
            .get(index)
            .ok_or(DappError::UnknownPassenger(index))?;
        self.selected_passenger = index;
        Ok(passenger)
    }

    pub fn selected_passenger(&self) -> Result<Address, DappError> {
        if self.passengers.is_empty() {
            return Err(DappError::NotInitialized);
        }
        self.passengers
            .get(self.selected_passenger)
            .copied()
            .ok_or(DappError::UnknownPassenger(self.selected_passenger))
    }

    fn owner(&self) -> Result<Address, DappError> {
        self.owner.ok_or(DappError::NotInitialized)
    }

    pub async fn is_operational(&self) -> Result<bool, DappError> {
        Ok(self.chain.is_operational(self.owner()?).await?)
    }

    /// Buys insurance for the selected passenger, paying `amount_ether`.
    pub async fn buy_insurance(
        &self,
        flight_code: &str,
        amount_ether: &str,
    ) -> Result<TxHash, DappError> {
        let passenger = self.selected_passenger()?;
        let value: U256 = parse_ether(amount_ether)
            .map_err(|_| DappError::InvalidAmount(amount_ether.to_string()))?;

        info!(flight = %flight_code, passenger = ?passenger, %value, "Buying Insurance");
        Ok(self.chain.buy_insurance(passenger, flight_code, value).await?)
    }

    /// Asks the oracles for `flight_code`'s status and returns the latest
    /// status plus refunds for the selected passenger not reported before.
    pub async fn fetch_status(&mut self, flight_code: &str) -> Result<StatusReport, DappError> {
        let owner = self.owner()?;
        let passenger = self.selected_passenger()?;

        let watch = self.open_watch().await;
        self.chain.fetch_flight_status(owner, flight_code).await?;
        self.settle(watch, |event| {
            matches!(event, LedgerEvent::Status(info) if info.flight_code == flight_code)
        })
        .await;

        let status = self.relay.status().await?;
        let refunds = self.relay.refunds().await?;
        let new_refunds = self.notices.unseen(passenger, flight_code, &refunds);

        Ok(StatusReport {
            status,
            new_refunds,
        })
    }

    /// Withdraws the selected passenger's credit and returns the first
    /// withdrawal the relay holds for them.
    pub async fn withdraw(&self) -> Result<Option<WithdrawRecord>, DappError> {
        let passenger = self.selected_passenger()?;

        let watch = self.open_watch().await;
        info!(passenger = ?passenger, "Withdrawing");
        self.chain.withdraw(passenger).await?;
        self.settle(watch, |event| {
            matches!(event, LedgerEvent::Withdraw(record) if record.passenger_id == passenger)
        })
        .await;

        let withdraws = self.relay.withdraws().await?;
        Ok(withdraws
            .into_iter()
            .find(|record| record.passenger_id == passenger))
    }

    async fn open_watch(&self) -> Option<LedgerWatch> {
        match self.relay.watch().await {
            Ok(watch) => Some(watch),
            Err(err) => {
                warn!(error = %err, "relay push channel unavailable, falling back to a timed wait");
                None
            }
        }
    }

    async fn settle(&self, watch: Option<LedgerWatch>, matches: impl Fn(&LedgerEvent) -> bool) {
        let timeout = self.settings.settle_timeout;
        match watch {
            Some(mut watch) => {
                if watch.wait_for(timeout, matches).await.is_none() {
                    warn!(?timeout, "no matching relay event before the settle timeout");
                }
            }
            None => tokio::time::sleep(timeout).await,
        }
    }
}
