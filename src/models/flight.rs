//! Flight status domain shared by the oracle services.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::eth::Address;

/// Flight outcome codes as defined by the OpenInsureApp contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StatusCode {
    Unknown,
    OnTime,
    LateAirline,
    LateWeather,
    LateTechnical,
    LateOther,
}

impl StatusCode {
    pub const ALL: [StatusCode; 6] = [
        StatusCode::Unknown,
        StatusCode::OnTime,
        StatusCode::LateAirline,
        StatusCode::LateWeather,
        StatusCode::LateTechnical,
        StatusCode::LateOther,
    ];

    pub fn code(self) -> u8 {
        match self {
            StatusCode::Unknown => 0,
            StatusCode::OnTime => 10,
            StatusCode::LateAirline => 20,
            StatusCode::LateWeather => 30,
            StatusCode::LateTechnical => 40,
            StatusCode::LateOther => 50,
        }
    }
}

impl From<StatusCode> for u8 {
    fn from(status: StatusCode) -> Self {
        status.code()
    }
}

#[derive(Debug, Error)]
#[error("unknown flight status code {0}")]
pub struct UnknownStatusCode(pub u8);

impl TryFrom<u8> for StatusCode {
    type Error = UnknownStatusCode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(StatusCode::Unknown),
            10 => Ok(StatusCode::OnTime),
            20 => Ok(StatusCode::LateAirline),
            30 => Ok(StatusCode::LateWeather),
            40 => Ok(StatusCode::LateTechnical),
            50 => Ok(StatusCode::LateOther),
            other => Err(UnknownStatusCode(other)),
        }
    }
}

/// Payload of an `OracleRequest` event. Each delivery triggers exactly one
/// responder pass and is then discarded; redeliveries are answered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightStatusRequest {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

/// Payload of a `FlightStatusInfo` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlightStatusInfo {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub status: StatusCode,
}
