use std::time::Duration;

use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Address, H256, U256};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};

use super::abi;
use super::{ChainClient, ChainError, ChainEvent, TxHash};
use crate::models::OracleResponseSubmission;

const DEFAULT_GAS_LIMIT: u64 = 3_000_000;
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JSON-RPC client for the FlightSurety app and data contracts.
#[derive(Clone)]
pub struct RpcChainClient {
    rpc_url: String,
    app_address: Address,
    data_address: Address,
    gas_limit: u64,
    receipt_timeout: Duration,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    topics: Vec<H256>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<H256>,
}

impl RpcChainClient {
    pub fn new(rpc_url: impl Into<String>, app_address: Address, data_address: Address) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            app_address,
            data_address,
            gas_limit: DEFAULT_GAS_LIMIT,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// How long a sent transaction may stay pending before the call gives up
    /// with [`ChainError::ReceiptTimeout`]. The transaction itself may still
    /// be mined afterwards.
    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let response = self
            .http
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        if let Some(err) = response.get("error") {
            return Err(ChainError::Rpc {
                code: err.pointer("/code").and_then(Value::as_i64).unwrap_or_default(),
                message: err
                    .pointer("/message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string(),
            });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ChainError::Decode(format!("{method}: no result in RPC response")))
    }

    async fn call(&self, to: Address, from: Address, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let result = self
            .rpc_call(
                "eth_call",
                json!([{ "from": from, "to": to, "data": hex_data(&data) }, "latest"]),
            )
            .await?;

        let encoded = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_call result is not a string".to_string()))?;
        parse_hex_bytes(encoded)
    }

    async fn send(
        &self,
        to: Address,
        from: Address,
        data: Vec<u8>,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let tx = json!({
            "from": from,
            "to": to,
            "data": hex_data(&data),
            "value": value,
            "gas": U256::from(self.gas_limit),
        });

        let result = self.rpc_call("eth_sendTransaction", json!([tx])).await?;
        let tx_hash: TxHash =
            serde_json::from_value(result).map_err(|err| ChainError::Decode(err.to_string()))?;

        self.wait_for_receipt(tx_hash).await?;
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<(), ChainError> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let receipt = self
                .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if receipt.is_null() {
                if Instant::now() >= deadline {
                    return Err(ChainError::ReceiptTimeout(tx_hash));
                }
                sleep(RECEIPT_POLL_INTERVAL).await;
                continue;
            }

            // Pre-Byzantium receipts carry no status; treat them as success.
            return match receipt.pointer("/status").and_then(Value::as_str) {
                Some(status) if parse_quantity(status)? == 0 => Err(ChainError::Reverted(tx_hash)),
                _ => Ok(()),
            };
        }
    }

    fn decode_raw_log(raw: RawLog) -> Result<Option<ChainEvent>, ChainError> {
        let data = parse_hex_bytes(&raw.data)?;
        let Some(event) = abi::decode_log(&raw.topics, &data)? else {
            return Ok(None);
        };

        let block_number = match raw.block_number {
            Some(number) => parse_quantity(&number)?,
            None => 0,
        };

        Ok(Some(ChainEvent {
            block_number,
            tx_hash: raw.transaction_hash,
            event,
        }))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn accounts(&self) -> Result<Vec<Address>, ChainError> {
        let result = self.rpc_call("eth_accounts", json!([])).await?;
        serde_json::from_value(result).map_err(|err| ChainError::Decode(err.to_string()))
    }

    async fn is_operational(&self, from: Address) -> Result<bool, ChainError> {
        let data = abi::encode_call(abi::IS_OPERATIONAL, &[]);
        let output = self.call(self.app_address, from, data).await?;
        abi::decode_bool(&output)
    }

    async fn register_oracle(&self, from: Address, stake: U256) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(abi::REGISTER_ORACLE, &[]);
        self.send(self.app_address, from, data, stake).await
    }

    async fn get_my_indexes(&self, from: Address) -> Result<[u8; 3], ChainError> {
        let data = abi::encode_call(abi::GET_MY_INDEXES, &[]);
        let output = self.call(self.app_address, from, data).await?;
        abi::decode_indexes(&output)
    }

    async fn submit_oracle_response(
        &self,
        from: Address,
        submission: &OracleResponseSubmission,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(
            abi::SUBMIT_ORACLE_RESPONSE,
            &[
                Token::Uint(U256::from(submission.index)),
                Token::String(submission.flight_code.clone()),
                Token::Uint(U256::from(submission.status_code.code())),
            ],
        );
        self.send(self.app_address, from, data, U256::zero()).await
    }

    async fn fetch_flight_status(
        &self,
        from: Address,
        flight_code: &str,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(
            abi::FETCH_FLIGHT_STATUS,
            &[Token::String(flight_code.to_string())],
        );
        self.send(self.app_address, from, data, U256::zero()).await
    }

    async fn buy_insurance(
        &self,
        from: Address,
        flight_code: &str,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(abi::BUY_INSURANCE, &[Token::String(flight_code.to_string())]);
        self.send(self.app_address, from, data, value).await
    }

    async fn withdraw(&self, from: Address) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(abi::WITHDRAW, &[]);
        self.send(self.app_address, from, data, U256::zero()).await
    }

    async fn authorize_caller(
        &self,
        from: Address,
        caller: Address,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(abi::AUTHORIZE_CALLER, &[Token::Address(caller)]);
        self.send(self.data_address, from, data, U256::zero()).await
    }

    async fn register_airline(
        &self,
        from: Address,
        name: &str,
        airline: Address,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(
            abi::REGISTER_AIRLINE,
            &[Token::String(name.to_string()), Token::Address(airline)],
        );
        self.send(self.data_address, from, data, U256::zero()).await
    }

    async fn submit_funds(&self, from: Address, value: U256) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(abi::SUBMIT_FUNDS, &[]);
        self.send(self.data_address, from, data, value).await
    }

    async fn register_flight(
        &self,
        from: Address,
        flight_code: &str,
        timestamp: u64,
    ) -> Result<TxHash, ChainError> {
        let data = abi::encode_call(
            abi::REGISTER_FLIGHT,
            &[
                Token::String(flight_code.to_string()),
                Token::Uint(U256::from(timestamp)),
            ],
        );
        self.send(self.data_address, from, data, U256::zero()).await
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| ChainError::Decode("eth_blockNumber result is not a string".to_string()))?;
        parse_quantity(quantity)
    }

    async fn events(&self, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>, ChainError> {
        let filter = json!({
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
            "address": self.app_address,
        });

        let result = self.rpc_call("eth_getLogs", json!([filter])).await?;
        let logs: Vec<RawLog> =
            serde_json::from_value(result).map_err(|err| ChainError::Decode(err.to_string()))?;

        let mut events = Vec::with_capacity(logs.len());
        for raw in logs {
            let tx_hash = raw.transaction_hash;
            match Self::decode_raw_log(raw) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, ?tx_hash, "skipping undecodable contract log");
                }
            }
        }

        Ok(events)
    }
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, ChainError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|err| ChainError::Decode(format!("invalid hex data: {err}")))
}

fn parse_quantity(value: &str) -> Result<u64, ChainError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|err| ChainError::Decode(format!("invalid quantity {value}: {err}")))
}
