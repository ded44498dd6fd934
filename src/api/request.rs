use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::amount::{self, AmountError, Wei};
use crate::domain::{Address, FlightKey};
use crate::ledger::Command;

/// A call submitted on behalf of `caller`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallRequest {
    /// Identity the call is made from
    pub caller: Address,

    /// Value attached to the call, in units (e.g. "1.5")
    #[serde(default)]
    pub value: Option<Decimal>,

    pub command: Command,
}

impl CallRequest {
    /// Attached value in wei.
    pub fn value_wei(&self) -> Result<Wei, AmountError> {
        match self.value {
            Some(units) => amount::from_units(units),
            None => Ok(0),
        }
    }
}

/// Flight identifiers as query parameters.
#[derive(Debug, Deserialize)]
pub struct FlightQuery {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

impl FlightQuery {
    pub fn key(&self) -> FlightKey {
        FlightKey::derive(&self.airline, &self.flight, self.timestamp)
    }
}

/// Paging for the notification feed.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Return events after this sequence number
    #[serde(default)]
    pub since: u64,

    /// Page size; capped by the server
    pub limit: Option<usize>,
}
