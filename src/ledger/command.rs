use serde::{Deserialize, Serialize};

use crate::domain::{Address, FlightKey, StatusCode};

/// A mutating call as submitted to the ledger.
///
/// Serialized with the method name as the `method` tag, e.g.
/// `{"method": "buy", "airline": "0x…", "flight": "AC110", "timestamp": 1}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Command {
    SetOperationalStatus {
        mode: bool,
    },
    SetAuthorizedCaller {
        caller: Address,
    },
    RegisterAirline {
        airline: Address,
    },
    Fund,
    RegisterFlight {
        flight: String,
        timestamp: u64,
    },
    Buy {
        airline: Address,
        flight: String,
        timestamp: u64,
    },
    Pay {
        airline: Address,
        flight: String,
        timestamp: u64,
    },
    CreditInsurees {
        airline: Address,
        flight: String,
        timestamp: u64,
    },
    RegisterOracle,
    FetchFlightStatus {
        airline: Address,
        flight: String,
        timestamp: u64,
    },
    SubmitOracleResponse {
        index: u8,
        airline: Address,
        flight: String,
        timestamp: u64,
        status: StatusCode,
    },
}

/// Which module a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The data store, called directly by an operator
    Store,
    /// The rules engine
    App,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetOperationalStatus { .. } => "set_operational_status",
            Command::SetAuthorizedCaller { .. } => "set_authorized_caller",
            Command::RegisterAirline { .. } => "register_airline",
            Command::Fund => "fund",
            Command::RegisterFlight { .. } => "register_flight",
            Command::Buy { .. } => "buy",
            Command::Pay { .. } => "pay",
            Command::CreditInsurees { .. } => "credit_insurees",
            Command::RegisterOracle => "register_oracle",
            Command::FetchFlightStatus { .. } => "fetch_flight_status",
            Command::SubmitOracleResponse { .. } => "submit_oracle_response",
        }
    }

    /// Whether the call may carry value.
    pub fn is_payable(&self) -> bool {
        matches!(self, Command::Fund | Command::Buy { .. } | Command::RegisterOracle)
    }

    pub fn target(&self) -> Target {
        match self {
            Command::SetOperationalStatus { .. }
            | Command::SetAuthorizedCaller { .. }
            | Command::CreditInsurees { .. } => Target::Store,
            _ => Target::App,
        }
    }

    /// Key of the flight the command refers to, if any.
    pub fn flight_key(&self) -> Option<FlightKey> {
        match self {
            Command::Buy {
                airline,
                flight,
                timestamp,
            }
            | Command::Pay {
                airline,
                flight,
                timestamp,
            }
            | Command::CreditInsurees {
                airline,
                flight,
                timestamp,
            }
            | Command::FetchFlightStatus {
                airline,
                flight,
                timestamp,
            }
            | Command::SubmitOracleResponse {
                airline,
                flight,
                timestamp,
                ..
            } => Some(FlightKey::derive(airline, flight, *timestamp)),
            _ => None,
        }
    }
}
