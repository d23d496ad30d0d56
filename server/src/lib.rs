//! FlightSurety relay library
//!
//! Off-chain side of the FlightSurety dapp: the oracle-relay server (oracle
//! registration, simulated oracle responses, event ledger and HTTP API) and the
//! front-end controller driven by the `dapp` CLI.

pub mod app_state;
pub mod chain;
pub mod config;
pub mod dapp;
pub mod event_listener;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
