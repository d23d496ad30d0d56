//! ABI encoding for FlightSurety calls and decoding of its events.

use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;

use super::{ChainError, ContractEvent, RefundEvent, WithdrawEvent};
use crate::models::{FlightStatusCode, OracleRequest};

pub const IS_OPERATIONAL: &str = "isOperational()";
pub const FETCH_FLIGHT_STATUS: &str = "fetchFlightStatus(string)";
pub const BUY_INSURANCE: &str = "buyInsurance(string)";
pub const WITHDRAW: &str = "withdraw()";
pub const REGISTER_ORACLE: &str = "registerOracle()";
pub const GET_MY_INDEXES: &str = "getMyIndexes()";
pub const SUBMIT_ORACLE_RESPONSE: &str = "submitOracleResponse(uint8,string,uint8)";
pub const AUTHORIZE_CALLER: &str = "authorizeCaller(address)";
pub const REGISTER_AIRLINE: &str = "registerAirline(string,address)";
pub const SUBMIT_FUNDS: &str = "submitFunds()";
pub const REGISTER_FLIGHT: &str = "registerFlight(string,uint256)";

pub const ORACLE_REQUEST_EVENT: &str = "OracleRequest(uint8,string)";
pub const ORACLE_REPORT_EVENT: &str = "OracleReport(string,uint8)";
pub const REFUND_EVENT: &str = "Refund(address,string,uint256)";
pub const WITHDRAW_EVENT: &str = "EmitWithdraw(address,uint256)";
pub const LOG_EVENT: &str = "Log(string)";
pub const FLIGHT_STATUS_INFO_EVENT: &str = "FlightStatusInfo(string,uint8)";

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn event_topic(signature: &str) -> H256 {
    H256::from(keccak256(signature.as_bytes()))
}

/// Calldata for `signature` applied to `args`.
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(args));
    data
}

pub fn decode_bool(data: &[u8]) -> Result<bool, ChainError> {
    let mut tokens = decode(&[ParamType::Bool], data)?;
    tokens
        .pop()
        .and_then(Token::into_bool)
        .ok_or_else(|| ChainError::Decode("expected bool".to_string()))
}

/// Return data of `getMyIndexes()`.
pub fn decode_indexes(data: &[u8]) -> Result<[u8; 3], ChainError> {
    let ty = ParamType::FixedArray(Box::new(ParamType::Uint(8)), 3);
    let items = decode(&[ty], data)?
        .pop()
        .and_then(Token::into_fixed_array)
        .ok_or_else(|| ChainError::Decode("expected uint8[3]".to_string()))?;

    if items.len() != 3 {
        return Err(ChainError::Decode(format!(
            "expected 3 indexes, got {}",
            items.len()
        )));
    }

    let mut indexes = [0u8; 3];
    for (slot, item) in indexes.iter_mut().zip(items) {
        *slot = uint_to_u8(item)?;
    }
    Ok(indexes)
}

/// Decodes an app contract log. Logs whose first topic is not a known event
/// yield `Ok(None)`.
pub fn decode_log(topics: &[H256], data: &[u8]) -> Result<Option<ContractEvent>, ChainError> {
    let Some(topic0) = topics.first() else {
        return Ok(None);
    };

    let event = if *topic0 == event_topic(ORACLE_REQUEST_EVENT) {
        let mut tokens = decode(&[ParamType::Uint(8), ParamType::String], data)?.into_iter();
        ContractEvent::OracleRequest(OracleRequest {
            index: uint_to_u8(next(&mut tokens)?)?,
            flight_code: token_string(next(&mut tokens)?)?,
        })
    } else if *topic0 == event_topic(ORACLE_REPORT_EVENT) {
        let mut tokens = decode(&[ParamType::String, ParamType::Uint(8)], data)?.into_iter();
        ContractEvent::OracleReport {
            flight_code: token_string(next(&mut tokens)?)?,
            status_code: uint_to_u8(next(&mut tokens)?)?,
        }
    } else if *topic0 == event_topic(REFUND_EVENT) {
        let types = [ParamType::Address, ParamType::String, ParamType::Uint(256)];
        let mut tokens = decode(&types, data)?.into_iter();
        ContractEvent::Refund(RefundEvent {
            passenger_id: token_address(next(&mut tokens)?)?,
            flight_code: token_string(next(&mut tokens)?)?,
            amount: token_uint(next(&mut tokens)?)?,
        })
    } else if *topic0 == event_topic(WITHDRAW_EVENT) {
        let mut tokens = decode(&[ParamType::Address, ParamType::Uint(256)], data)?.into_iter();
        ContractEvent::Withdraw(WithdrawEvent {
            passenger_id: token_address(next(&mut tokens)?)?,
            amount: token_uint(next(&mut tokens)?)?,
        })
    } else if *topic0 == event_topic(LOG_EVENT) {
        let mut tokens = decode(&[ParamType::String], data)?.into_iter();
        ContractEvent::Log(token_string(next(&mut tokens)?)?)
    } else if *topic0 == event_topic(FLIGHT_STATUS_INFO_EVENT) {
        let mut tokens = decode(&[ParamType::String, ParamType::Uint(8)], data)?.into_iter();
        let flight_code = token_string(next(&mut tokens)?)?;
        let code = uint_to_u8(next(&mut tokens)?)?;
        let status = FlightStatusCode::from_code(code)
            .ok_or_else(|| ChainError::Decode(format!("unknown flight status code {code}")))?;
        ContractEvent::FlightStatusInfo {
            flight_code,
            status,
        }
    } else {
        return Ok(None);
    };

    Ok(Some(event))
}

fn decode(types: &[ParamType], data: &[u8]) -> Result<Vec<Token>, ChainError> {
    abi::decode(types, data).map_err(|err| ChainError::Decode(err.to_string()))
}

fn next(tokens: &mut impl Iterator<Item = Token>) -> Result<Token, ChainError> {
    tokens
        .next()
        .ok_or_else(|| ChainError::Decode("missing event parameter".to_string()))
}

fn token_string(token: Token) -> Result<String, ChainError> {
    token
        .into_string()
        .ok_or_else(|| ChainError::Decode("expected string".to_string()))
}

fn token_address(token: Token) -> Result<Address, ChainError> {
    token
        .into_address()
        .ok_or_else(|| ChainError::Decode("expected address".to_string()))
}

fn token_uint(token: Token) -> Result<U256, ChainError> {
    token
        .into_uint()
        .ok_or_else(|| ChainError::Decode("expected uint".to_string()))
}

fn uint_to_u8(token: Token) -> Result<u8, ChainError> {
    let value = token_uint(token)?;
    if value > U256::from(u8::MAX) {
        return Err(ChainError::Decode(format!("{value} does not fit uint8")));
    }
    Ok(value.low_u32() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_match_known_erc20_values() {
        assert_eq!(
            hex::encode(selector("transfer(address,uint256)")),
            "a9059cbb"
        );
        assert_eq!(
            hex::encode(event_topic("Transfer(address,address,uint256)")),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn decodes_oracle_request() {
        let data = abi::encode(&[
            Token::Uint(U256::from(4)),
            Token::String("FLIGHT 1234".to_string()),
        ]);

        let event = decode_log(&[event_topic(ORACLE_REQUEST_EVENT)], &data).unwrap();
        assert_eq!(
            event,
            Some(ContractEvent::OracleRequest(OracleRequest {
                index: 4,
                flight_code: "FLIGHT 1234".to_string(),
            }))
        );
    }

    #[test]
    fn decodes_refund_amount_in_wei() {
        let passenger = Address::repeat_byte(0xaa);
        let amount = U256::from(5_000_000_000_000_000_000u64);
        let data = abi::encode(&[
            Token::Address(passenger),
            Token::String("FLIGHT 1234".to_string()),
            Token::Uint(amount),
        ]);

        match decode_log(&[event_topic(REFUND_EVENT)], &data).unwrap() {
            Some(ContractEvent::Refund(refund)) => {
                assert_eq!(refund.passenger_id, passenger);
                assert_eq!(refund.flight_code, "FLIGHT 1234");
                assert_eq!(refund.amount, amount);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn rejects_status_outside_the_enumeration() {
        let data = abi::encode(&[
            Token::String("FLIGHT 1234".to_string()),
            Token::Uint(U256::from(35)),
        ]);

        let result = decode_log(&[event_topic(FLIGHT_STATUS_INFO_EVENT)], &data);
        assert!(matches!(result, Err(ChainError::Decode(_))));
    }

    #[test]
    fn unknown_topics_are_skipped() {
        let topic = event_topic("SomethingElse(uint256)");
        assert_eq!(decode_log(&[topic], &[]).unwrap(), None);
        assert_eq!(decode_log(&[], &[]).unwrap(), None);
    }

    #[test]
    fn decodes_assigned_indexes() {
        let data = abi::encode(&[Token::FixedArray(vec![
            Token::Uint(U256::from(1)),
            Token::Uint(U256::from(4)),
            Token::Uint(U256::from(7)),
        ])]);
        assert_eq!(decode_indexes(&data).unwrap(), [1, 4, 7]);
    }

    #[test]
    fn call_data_starts_with_selector() {
        let data = encode_call(WITHDRAW, &[]);
        assert_eq!(data, selector(WITHDRAW).to_vec());

        let data = encode_call(
            FETCH_FLIGHT_STATUS,
            &[Token::String("FLIGHT 1234".to_string())],
        );
        assert_eq!(&data[..4], &selector(FETCH_FLIGHT_STATUS));
        assert_eq!((data.len() - 4) % 32, 0);
    }
}
