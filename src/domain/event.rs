use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::Address;
use super::flight::StatusCode;

/// Outbound notification consumed by oracle workers and the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A status request was opened for oracles holding `index`.
    #[serde(rename = "oracle_request")]
    OracleRequest {
        index: u8,
        airline: Address,
        flight: String,
        timestamp: u64,
    },

    /// An oracle response was recorded.
    #[serde(rename = "oracle_report")]
    OracleReport {
        airline: Address,
        flight: String,
        timestamp: u64,
        status: StatusCode,
    },

    /// Oracles reached quorum on a flight status.
    #[serde(rename = "flight_status_info")]
    FlightStatusInfo {
        airline: Address,
        flight: String,
        timestamp: u64,
        status: StatusCode,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OracleRequest { .. } => "oracle_request",
            Event::OracleReport { .. } => "oracle_report",
            Event::FlightStatusInfo { .. } => "flight_status_info",
        }
    }
}

/// A committed event with its position in the ledger's notification log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 1
    pub sequence: u64,

    /// Call that emitted the event
    pub tx_id: Uuid,

    /// When the emitting call committed
    pub recorded_at: DateTime<Utc>,

    #[serde(flatten)]
    pub event: Event,
}
