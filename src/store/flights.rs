use ahash::AHashMap;

use crate::domain::{Address, Flight, FlightKey, StatusCode, SuretyError, SuretyResult};

/// Known flights keyed by their derived key.
#[derive(Debug, Clone, Default)]
pub struct FlightRegistry {
    flights: AHashMap<FlightKey, Flight>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn is_registered(&self, key: &FlightKey) -> bool {
        self.flights.get(key).map(|f| f.registered).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Register a flight, or re-affirm an existing registration.
    ///
    /// Re-registering keeps the status an earlier quorum settled on.
    pub fn register(&mut self, airline: &Address, flight: &str, timestamp: u64) -> FlightKey {
        let key = FlightKey::derive(airline, flight, timestamp);

        self.flights
            .entry(key)
            .and_modify(|f| f.registered = true)
            .or_insert_with(|| Flight::new(airline.clone(), flight, timestamp));

        key
    }

    /// Apply a quorum-agreed status.
    ///
    /// Returns `false` when the flight was already finalized; the first
    /// finalized status is kept.
    pub fn finalize_status(&mut self, key: &FlightKey, status: StatusCode) -> SuretyResult<bool> {
        let flight = self
            .flights
            .get_mut(key)
            .filter(|f| f.registered)
            .ok_or_else(|| SuretyError::state("flight must be registered"))?;

        if flight.is_finalized {
            return Ok(false);
        }

        flight.status_code = status;
        flight.is_finalized = true;
        Ok(true)
    }
}
