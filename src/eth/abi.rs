//! Hand-rolled ABI codec for the OpenInsureApp call surface.
//!
//! The contract interface is small and fixed, so selectors and event topics
//! are derived from the canonical signatures with keccak-256 rather than
//! pulling in a full ABI library.

use std::sync::OnceLock;

use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::eth::Address;
use crate::models::{FlightStatusInfo, FlightStatusRequest, StatusCode, UnknownStatusCode};

pub const WORD: usize = 32;

const GET_REGISTRATION_FEE: &str = "getRegistrationFee()";
const REGISTER_ORACLE: &str = "registerOracle()";
const GET_MY_INDEXES: &str = "getMyIndexes()";
const FETCH_FLIGHT_STATUS: &str = "fetchFlightStatus(address,string,uint256)";
const SUBMIT_ORACLE_RESPONSE: &str = "submitOracleResponse(uint8,address,string,uint256,uint8)";

const ORACLE_REQUEST: &str = "OracleRequest(uint8,address,string,uint256)";
const FLIGHT_STATUS_INFO: &str = "FlightStatusInfo(address,string,uint256,uint8)";

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("payload truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("word at offset {offset} does not fit the target type")]
    Overflow { offset: usize },
    #[error("invalid utf-8 in string payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Status(#[from] UnknownStatusCode),
}

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn event_topic(signature: &str) -> String {
    format!("0x{}", hex::encode(keccak256(signature.as_bytes())))
}

/// Topic of `OracleRequest(uint8 index, address airline, string flight,
/// uint256 timestamp)`, as it appears in `eth_getLogs` responses.
pub fn oracle_request_topic() -> &'static str {
    static TOPIC: OnceLock<String> = OnceLock::new();
    TOPIC.get_or_init(|| event_topic(ORACLE_REQUEST)).as_str()
}

/// Topic of `FlightStatusInfo(address airline, string flight, uint256
/// timestamp, uint8 status)`.
pub fn flight_status_info_topic() -> &'static str {
    static TOPIC: OnceLock<String> = OnceLock::new();
    TOPIC
        .get_or_init(|| event_topic(FLIGHT_STATUS_INFO))
        .as_str()
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(address: Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn string_tail(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut tail = Vec::with_capacity(WORD + padded);
    tail.extend_from_slice(&uint_word(bytes.len() as u128));
    tail.extend_from_slice(bytes);
    tail.resize(WORD + padded, 0);
    tail
}

pub fn encode_get_registration_fee() -> Vec<u8> {
    selector(GET_REGISTRATION_FEE).to_vec()
}

pub fn encode_register_oracle() -> Vec<u8> {
    selector(REGISTER_ORACLE).to_vec()
}

pub fn encode_get_my_indexes() -> Vec<u8> {
    selector(GET_MY_INDEXES).to_vec()
}

pub fn encode_fetch_flight_status(airline: Address, flight: &str, timestamp: u64) -> Vec<u8> {
    let mut data = selector(FETCH_FLIGHT_STATUS).to_vec();
    data.extend_from_slice(&address_word(airline));
    // `flight` is dynamic; its head slot holds the tail offset.
    data.extend_from_slice(&uint_word((3 * WORD) as u128));
    data.extend_from_slice(&uint_word(timestamp as u128));
    data.extend_from_slice(&string_tail(flight));
    data
}

pub fn encode_submit_oracle_response(
    index: u8,
    airline: Address,
    flight: &str,
    timestamp: u64,
    status: StatusCode,
) -> Vec<u8> {
    let mut data = selector(SUBMIT_ORACLE_RESPONSE).to_vec();
    data.extend_from_slice(&uint_word(index as u128));
    data.extend_from_slice(&address_word(airline));
    data.extend_from_slice(&uint_word((5 * WORD) as u128));
    data.extend_from_slice(&uint_word(timestamp as u128));
    data.extend_from_slice(&uint_word(status.code() as u128));
    data.extend_from_slice(&string_tail(flight));
    data
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], AbiError> {
    let end = (index + 1) * WORD;
    if data.len() < end {
        return Err(AbiError::Truncated {
            expected: end,
            actual: data.len(),
        });
    }
    Ok(&data[index * WORD..end])
}

fn decode_u64(data: &[u8], index: usize) -> Result<u64, AbiError> {
    let word = word_at(data, index)?;
    if word[..WORD - 8].iter().any(|&byte| byte != 0) {
        return Err(AbiError::Overflow {
            offset: index * WORD,
        });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(raw))
}

fn decode_u8(data: &[u8], index: usize) -> Result<u8, AbiError> {
    let word = word_at(data, index)?;
    if word[..WORD - 1].iter().any(|&byte| byte != 0) {
        return Err(AbiError::Overflow {
            offset: index * WORD,
        });
    }
    Ok(word[WORD - 1])
}

fn decode_address(data: &[u8], index: usize) -> Result<Address, AbiError> {
    let word = word_at(data, index)?;
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&word[12..]);
    Ok(Address::from_bytes(raw))
}

fn decode_string(data: &[u8], head_index: usize) -> Result<String, AbiError> {
    let offset = decode_u64(data, head_index)? as usize;
    let header_end = offset + WORD;
    if data.len() < header_end {
        return Err(AbiError::Truncated {
            expected: header_end,
            actual: data.len(),
        });
    }
    if data[offset..header_end - 8].iter().any(|&byte| byte != 0) {
        return Err(AbiError::Overflow { offset });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[header_end - 8..header_end]);
    let length = u64::from_be_bytes(raw) as usize;

    let end = header_end + length;
    if data.len() < end {
        return Err(AbiError::Truncated {
            expected: end,
            actual: data.len(),
        });
    }
    Ok(String::from_utf8(data[header_end..end].to_vec())?)
}

/// `getRegistrationFee()` returns one `uint256` wei amount.
pub fn decode_registration_fee(data: &[u8]) -> Result<u128, AbiError> {
    let word = word_at(data, 0)?;
    if word[..WORD - 16].iter().any(|&byte| byte != 0) {
        return Err(AbiError::Overflow { offset: 0 });
    }
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&word[WORD - 16..]);
    Ok(u128::from_be_bytes(raw))
}

/// `getMyIndexes()` returns `uint8[3]`: a static array of three full words.
pub fn decode_index_set(data: &[u8]) -> Result<[u8; 3], AbiError> {
    Ok([
        decode_u8(data, 0)?,
        decode_u8(data, 1)?,
        decode_u8(data, 2)?,
    ])
}

pub fn decode_oracle_request(data: &[u8]) -> Result<FlightStatusRequest, AbiError> {
    Ok(FlightStatusRequest {
        index: decode_u8(data, 0)?,
        airline: decode_address(data, 1)?,
        flight: decode_string(data, 2)?,
        timestamp: decode_u64(data, 3)?,
    })
}

pub fn decode_flight_status_info(data: &[u8]) -> Result<FlightStatusInfo, AbiError> {
    let status = StatusCode::try_from(decode_u8(data, 3)?)?;
    Ok(FlightStatusInfo {
        airline: decode_address(data, 0)?,
        flight: decode_string(data, 1)?,
        timestamp: decode_u64(data, 2)?,
        status,
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        let mut raw = [0u8; 20];
        raw[19] = last;
        Address::from_bytes(raw)
    }

    #[test]
    fn keccak_matches_the_known_empty_input_vector() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn event_topics_are_prefixed_32_byte_hashes() {
        let topic = oracle_request_topic();
        assert!(topic.starts_with("0x"));
        assert_eq!(topic.len(), 66);
        assert_ne!(topic, flight_status_info_topic());
    }

    #[test]
    fn submit_oracle_response_encodes_head_then_flight_tail() {
        let data = encode_submit_oracle_response(
            5,
            addr(0xaa),
            "BAC2002",
            1_700_000_000,
            StatusCode::LateAirline,
        );

        // selector + five head words + length word + one padded content word
        assert_eq!(data.len(), 4 + 7 * WORD);
        let body = &data[4..];
        assert_eq!(body[WORD - 1], 5);
        assert_eq!(body[2 * WORD - 1], 0xaa);
        assert_eq!(body[3 * WORD - 1], (5 * WORD) as u8);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&body[4 * WORD - 8..4 * WORD]);
        assert_eq!(u64::from_be_bytes(timestamp), 1_700_000_000);
        assert_eq!(body[5 * WORD - 1], 20);
        assert_eq!(body[6 * WORD - 1], 7);
        assert_eq!(&body[6 * WORD..6 * WORD + 7], b"BAC2002");
        assert!(body[6 * WORD + 7..].iter().all(|&byte| byte == 0));
    }

    #[test]
    fn fetch_flight_status_places_the_flight_after_a_three_word_head() {
        let data = encode_fetch_flight_status(addr(1), "ND1309", 42);
        assert_eq!(data.len(), 4 + 5 * WORD);
        let body = &data[4..];
        assert_eq!(body[2 * WORD - 1], (3 * WORD) as u8);
        assert_eq!(body[4 * WORD - 1], 6);
        assert_eq!(&body[4 * WORD..4 * WORD + 6], b"ND1309");
    }

    #[test]
    fn no_arg_calls_are_bare_selectors() {
        assert_eq!(encode_register_oracle().len(), 4);
        assert_eq!(encode_get_my_indexes().len(), 4);
        assert_eq!(encode_get_registration_fee().len(), 4);
        assert_ne!(encode_register_oracle(), encode_get_my_indexes());
    }

    #[test]
    fn decodes_a_registration_fee_word() {
        let mut data = vec![0u8; WORD];
        data[WORD - 16..].copy_from_slice(&1_000_000_000_000_000_000u128.to_be_bytes());
        assert_eq!(
            decode_registration_fee(&data).unwrap(),
            1_000_000_000_000_000_000
        );
    }

    #[test]
    fn rejects_a_fee_beyond_u128() {
        let mut data = vec![0u8; WORD];
        data[0] = 1;
        assert!(matches!(
            decode_registration_fee(&data),
            Err(AbiError::Overflow { .. })
        ));
    }

    #[test]
    fn decodes_the_index_set() {
        let mut data = vec![0u8; 3 * WORD];
        data[WORD - 1] = 7;
        data[3 * WORD - 1] = 4;
        assert_eq!(decode_index_set(&data).unwrap(), [7, 0, 4]);
        assert!(matches!(
            decode_index_set(&data[..2 * WORD]),
            Err(AbiError::Truncated { .. })
        ));
    }

    #[test]
    fn decodes_an_oracle_request_payload() {
        let data = test_payloads::oracle_request(5, addr(0xbb), "BAC2002", 1_700_000_000);
        let request = decode_oracle_request(&data).unwrap();
        assert_eq!(request.index, 5);
        assert_eq!(request.airline, addr(0xbb));
        assert_eq!(request.flight, "BAC2002");
        assert_eq!(request.timestamp, 1_700_000_000);
    }

    #[test]
    fn decodes_a_flight_name_longer_than_one_word() {
        let flight = "INTERCONTINENTAL-LONG-HAUL-SERVICE-0042";
        let data = test_payloads::flight_status_info(addr(1), flight, 9, 30);
        let info = decode_flight_status_info(&data).unwrap();
        assert_eq!(info.flight, flight);
        assert_eq!(info.status, StatusCode::LateWeather);
    }

    #[test]
    fn rejects_status_codes_outside_the_domain() {
        let data = test_payloads::flight_status_info(addr(1), "X", 9, 42);
        assert!(matches!(
            decode_flight_status_info(&data),
            Err(AbiError::Status(_))
        ));
    }

    #[test]
    fn truncated_payloads_error_out() {
        let data = test_payloads::oracle_request(5, addr(1), "BAC2002", 1);
        assert!(decode_oracle_request(&data[..3 * WORD]).is_err());
        assert!(decode_oracle_request(&[]).is_err());
    }
}
