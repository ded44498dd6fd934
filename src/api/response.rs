use axum::http::StatusCode as HttpStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::amount::{self, Wei};
use crate::domain::{Address, EventRecord, Flight, FlightKey, StatusCode, SuretyError};
use crate::ledger::Revert;
use crate::store::{Airline, InsurancePolicy};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Operational gate state.
#[derive(Debug, Serialize)]
pub struct OperationalResponse {
    pub operational: bool,
    /// Calls executed so far
    pub sequence: u64,
}

/// Registration state of an airline.
#[derive(Debug, Serialize)]
pub struct AirlineResponse {
    pub address: Address,
    pub registered: bool,
    pub funded: bool,
    /// Votes collected while pending
    pub votes: usize,
}

impl AirlineResponse {
    pub fn new(address: Address, airline: Option<&Airline>) -> Self {
        match airline {
            Some(a) => AirlineResponse {
                address,
                registered: a.registered,
                funded: a.funded,
                votes: a.vote_count(),
            },
            None => AirlineResponse {
                address,
                registered: false,
                funded: false,
                votes: 0,
            },
        }
    }
}

/// A registered flight.
#[derive(Debug, Serialize)]
pub struct FlightResponse {
    pub key: FlightKey,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub registered: bool,
    pub status_code: StatusCode,
    pub status: &'static str,
    pub is_finalized: bool,
}

impl From<&Flight> for FlightResponse {
    fn from(flight: &Flight) -> Self {
        FlightResponse {
            key: flight.key,
            airline: flight.airline.clone(),
            flight: flight.flight.clone(),
            timestamp: flight.timestamp,
            registered: flight.registered,
            status_code: flight.status_code,
            status: flight.status_code.label(),
            is_finalized: flight.is_finalized,
        }
    }
}

/// Derived flight key.
#[derive(Debug, Serialize)]
pub struct FlightKeyResponse {
    pub key: FlightKey,
    pub registered: bool,
}

/// A passenger's policy on one flight.
#[derive(Debug, Serialize)]
pub struct InsuranceResponse {
    pub passenger: Address,
    pub flight_key: FlightKey,
    pub insured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<InsurancePolicy>,
}

/// Indexes assigned to an oracle.
#[derive(Debug, Serialize)]
pub struct OracleIndexesResponse {
    pub oracle: Address,
    pub registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexes: Option<[u8; 3]>,
}

/// Account balance in wei and units.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub account: Address,
    #[serde(with = "amount::as_string")]
    pub wei: Wei,
    pub units: String,
}

impl BalanceResponse {
    pub fn new(account: Address, wei: Wei) -> Self {
        let units = amount::to_units(wei)
            .map(|d| d.to_string())
            .unwrap_or_else(|| wei.to_string());
        BalanceResponse { account, wei, units }
    }
}

/// A page of the notification feed.
#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventRecord>,
    /// Pass as `since` to fetch the following page
    pub next: u64,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Set when the error comes from a reverted call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<Uuid>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            tx_id: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "BAD_REQUEST")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "NOT_FOUND")
    }

    /// Response for a reverted call, with its HTTP status.
    pub fn from_revert(revert: &Revert) -> (HttpStatus, Self) {
        let body = ErrorResponse {
            error: revert.error.to_string(),
            code: revert.error.code().to_string(),
            tx_id: Some(revert.tx_id),
        };
        (status_for(&revert.error), body)
    }
}

/// HTTP status for each error kind.
pub fn status_for(error: &SuretyError) -> HttpStatus {
    match error {
        SuretyError::Operational => HttpStatus::SERVICE_UNAVAILABLE,
        SuretyError::Authorization(_) => HttpStatus::FORBIDDEN,
        SuretyError::Validation(_) => HttpStatus::BAD_REQUEST,
        SuretyError::State(_) | SuretyError::Transfer(_) => HttpStatus::CONFLICT,
    }
}
