//! FlightSurety dapp CLI
//!
//! Terminal front end for passengers: seeds the demo data, buys insurance,
//! requests flight statuses and withdraws payouts through the relay.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ethers::types::{Address, U256};
use ethers::utils::format_ether;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use flightsurety_server::chain::RpcChainClient;
use flightsurety_server::config::NetworkConfig;
use flightsurety_server::dapp::{ControllerSettings, FrontEndController, RelayClient, StatusReport};
use flightsurety_server::models::WithdrawRecord;

#[derive(Parser)]
#[command(name = "dapp")]
#[command(about = "FlightSurety passenger front end")]
struct Cli {
    /// Network entry to use from the network config file
    #[arg(short, long, env = "NETWORK", default_value = "localhost")]
    network: String,

    /// Network config file
    #[arg(long, env = "FLIGHTSURETY_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Base URL of the relay server
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:3000")]
    relay_url: String,

    /// Airline registered when the data contract was deployed
    #[arg(
        long,
        env = "FIRST_AIRLINE",
        default_value = "0xf17f52151EbEF6C7334FAD080c5704D77216b732"
    )]
    first_airline: Address,

    /// Passenger index (0-4) acting in this run
    #[arg(short, long, default_value_t = 0)]
    passenger: usize,

    /// Longest wait, in milliseconds, for an action's outcome
    #[arg(long, env = "SETTLE_TIMEOUT_MS", default_value_t = 5000)]
    settle_timeout_ms: u64,

    /// Longest wait, in milliseconds, for a transaction receipt
    #[arg(long, env = "CHAIN_RECEIPT_TIMEOUT_MS", default_value_t = 120_000)]
    receipt_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize the app contract and register demo airlines and flights
    Seed,
    /// Check whether the app contract is operational
    Operational,
    /// Buy insurance for a flight
    Buy {
        /// Flight code, e.g. "FLIGHT 1234"
        #[arg(short, long)]
        flight: String,
        /// Amount in ether
        #[arg(short, long)]
        amount: String,
    },
    /// Ask the oracles for a flight's status
    Status {
        #[arg(short, long)]
        flight: String,
    },
    /// Withdraw credited refunds
    Withdraw,
    /// Seed, then read commands from stdin
    Session,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let network = NetworkConfig::load(&cli.config, &cli.network)
        .context("failed to load network config")?;
    let chain = Arc::new(
        RpcChainClient::new(
            network.url.clone(),
            network.app_address,
            network.data_address,
        )
        .with_receipt_timeout(Duration::from_millis(cli.receipt_timeout_ms)),
    );
    let settings = ControllerSettings {
        app_address: network.app_address,
        first_airline: cli.first_airline,
        settle_timeout: Duration::from_millis(cli.settle_timeout_ms),
    };
    let mut controller = FrontEndController::new(
        chain,
        RelayClient::new(cli.relay_url.clone()),
        settings,
    );

    match cli.command {
        Commands::Seed => {
            controller.initialize().await?;
            print_flights(&controller);
        }
        Commands::Session => {
            controller.initialize().await?;
            controller.select_passenger(cli.passenger)?;
            print_flights(&controller);
            print_passengers(&controller);
            run_session(&mut controller).await?;
        }
        command => {
            controller.load_accounts().await?;
            controller.select_passenger(cli.passenger)?;
            run_command(&mut controller, command).await?;
        }
    }

    Ok(())
}

async fn run_command(controller: &mut FrontEndController, command: Commands) -> Result<()> {
    match command {
        Commands::Operational => {
            println!("Operational Status: {}", controller.is_operational().await?);
        }
        Commands::Buy { flight, amount } => {
            let tx = controller.buy_insurance(&flight, &amount).await?;
            println!("Insurance bought successfully ({tx:?})");
        }
        Commands::Status { flight } => {
            let report = controller.fetch_status(&flight).await?;
            print_status_report(&report);
        }
        Commands::Withdraw => {
            let record = controller.withdraw().await?;
            print_withdraw(record.as_ref());
        }
        Commands::Seed | Commands::Session => {}
    }
    Ok(())
}

async fn run_session(controller: &mut FrontEndController) -> Result<()> {
    println!("commands: flights | passengers | passenger <n> | buy <flight#> <ether> | status <flight#> | withdraw | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => Ok(()),
            ["quit"] | ["exit"] => break,
            ["flights"] => {
                print_flights(controller);
                Ok(())
            }
            ["passengers"] => {
                print_passengers(controller);
                Ok(())
            }
            ["passenger", index] => match index.parse() {
                Ok(index) => controller
                    .select_passenger(index)
                    .map(|passenger| println!("acting as {passenger:?}"))
                    .map_err(Into::into),
                Err(_) => Err(anyhow::anyhow!("passenger index must be a number")),
            },
            ["buy", flight, amount] => match flight_code(controller, flight) {
                Ok(code) => controller
                    .buy_insurance(&code, amount)
                    .await
                    .map(|_| println!("Insurance bought successfully"))
                    .map_err(Into::into),
                Err(err) => Err(err),
            },
            ["status", flight] => match flight_code(controller, flight) {
                Ok(code) => controller
                    .fetch_status(&code)
                    .await
                    .map(|report| print_status_report(&report))
                    .map_err(Into::into),
                Err(err) => Err(err),
            },
            ["withdraw"] => controller
                .withdraw()
                .await
                .map(|record| print_withdraw(record.as_ref()))
                .map_err(Into::into),
            _ => Err(anyhow::anyhow!("unrecognised command: {line}")),
        };

        if let Err(err) = result {
            eprintln!("error: {err:#}");
        }
    }

    Ok(())
}

/// Accepts either an index into the seeded flight list or a literal code.
fn flight_code(controller: &FrontEndController, flight: &str) -> Result<String> {
    match flight.parse::<usize>() {
        Ok(index) => controller
            .flights()
            .get(index)
            .map(|flight| flight.code.clone())
            .with_context(|| format!("no flight #{index}")),
        Err(_) => Ok(flight.to_string()),
    }
}

fn print_flights(controller: &FrontEndController) {
    for (i, flight) in controller.flights().iter().enumerate() {
        println!(
            "#{i}: {} - {} - {:?} - {}",
            flight.code, flight.airline_name, flight.airline, flight.timestamp
        );
    }
}

fn print_passengers(controller: &FrontEndController) {
    for (i, passenger) in controller.passengers().iter().enumerate() {
        println!("passenger {i}: {passenger:?}");
    }
}

fn print_status_report(report: &StatusReport) {
    match &report.status {
        Some(status) => println!("{status}"),
        None => println!("no flight status reported yet"),
    }

    for refund in &report.new_refunds {
        println!(
            "A refund of {} Ether was sent to your balance due to flight {} being delayed",
            format_ether(U256::from(refund.amount)),
            refund.flight_code
        );
    }
}

fn print_withdraw(record: Option<&WithdrawRecord>) {
    match record {
        Some(record) => println!(
            "A withdraw of {} Ether was sent to your account",
            format_ether(U256::from(record.amount))
        ),
        None => println!("no withdrawal recorded for this passenger"),
    }
}
