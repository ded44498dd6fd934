//! The rules engine: the only writer the data store accepts.
//!
//! Each operation checks the operational gate, checks the caller's role
//! against the store, validates inputs, and then drives the store through
//! its authorized mutators using the engine's own identity.

pub mod capability;
pub mod entropy;

pub use capability::{check, Operation, RoleView};
pub use entropy::{HashIndexSource, IndexSeed, IndexSource, ScriptedIndexSource};

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::amount;
use crate::domain::{
    Address, Event, FlightKey, Parameters, StatusCode, SuretyError, SuretyResult, Wei,
};
use crate::ledger::ValueTransfer;
use crate::store::{DataStore, Tally};

/// Context of one call into the engine.
#[derive(Debug, Clone)]
pub struct Call {
    pub caller: Address,
    /// Value attached to the call, already deposited into the pool
    pub value: Wei,
    pub entropy: [u8; 32],
    /// Notifications emitted so far
    pub events: Vec<Event>,
}

impl Call {
    pub fn new(caller: Address, value: Wei) -> Self {
        Call {
            caller,
            value,
            entropy: [0; 32],
            events: Vec::new(),
        }
    }

    pub fn with_entropy(mut self, entropy: [u8; 32]) -> Self {
        self.entropy = entropy;
        self
    }

    fn emit(&mut self, event: Event) {
        debug!(event = event.name(), "Event emitted");
        self.events.push(event);
    }
}

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Admission {
    Registered,
    /// Awaiting more votes
    Pending { votes: usize, required: usize },
}

/// Stateless rule evaluation over a [`DataStore`].
#[derive(Debug, Clone)]
pub struct RulesEngine {
    identity: Address,
    params: Parameters,
    index_source: Arc<dyn IndexSource>,
}

impl RulesEngine {
    pub fn new(identity: Address, params: Parameters) -> Self {
        Self::with_index_source(identity, params, Arc::new(HashIndexSource))
    }

    pub fn with_index_source(
        identity: Address,
        params: Parameters,
        index_source: Arc<dyn IndexSource>,
    ) -> Self {
        RulesEngine {
            identity,
            params,
            index_source,
        }
    }

    /// Identity the store must have bound as its authorized caller.
    pub fn identity(&self) -> &Address {
        &self.identity
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    fn require_operational(store: &DataStore) -> SuretyResult<()> {
        if store.is_operational() {
            Ok(())
        } else {
            Err(SuretyError::Operational)
        }
    }

    /// Register `candidate` directly during bootstrap, or count the
    /// caller's vote once the registry has grown past it.
    pub fn register_airline(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        candidate: &Address,
    ) -> SuretyResult<Admission> {
        Self::require_operational(store)?;
        check(store, &call.caller, Operation::RegisterAirline)?;

        if candidate.is_empty() {
            return Err(SuretyError::validation("airline address is required"));
        }
        if store.is_airline_registered(candidate) {
            return Err(SuretyError::state("airline is already registered"));
        }

        let registered = store.registered_airline_count();
        if registered < self.params.bootstrap_airlines {
            store.register_airline(&self.identity, candidate)?;
            info!(airline = %candidate, sponsor = %call.caller, "Airline registered");
            return Ok(Admission::Registered);
        }

        check(store, &call.caller, Operation::VoteForAirline)?;
        let votes = store.record_airline_vote(&self.identity, candidate, &call.caller)?;

        // Strict majority of the airlines registered right now.
        let required = registered / 2 + 1;
        if votes >= required {
            store.register_airline(&self.identity, candidate)?;
            info!(airline = %candidate, votes, "Airline registered by vote");
            Ok(Admission::Registered)
        } else {
            info!(airline = %candidate, voter = %call.caller, votes, required, "Vote recorded");
            Ok(Admission::Pending { votes, required })
        }
    }

    /// Mark the calling airline funded if it sent at least the ante.
    pub fn fund(&self, store: &mut DataStore, call: &mut Call) -> SuretyResult<()> {
        Self::require_operational(store)?;
        check(store, &call.caller, Operation::Fund)?;

        if call.value < self.params.airline_ante {
            return Err(SuretyError::state(format!(
                "insufficient funds sent: the ante is {}",
                amount::describe(self.params.airline_ante)
            )));
        }

        store.mark_airline_funded(&self.identity, &call.caller)?;
        info!(airline = %call.caller, value = %call.value, "Airline funded");
        Ok(())
    }

    pub fn register_flight(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        flight: &str,
        timestamp: u64,
    ) -> SuretyResult<FlightKey> {
        Self::require_operational(store)?;
        check(store, &call.caller, Operation::RegisterFlight)?;

        if flight.trim().is_empty() {
            return Err(SuretyError::validation("flight designator is required"));
        }

        let key = store.register_flight(&self.identity, &call.caller, flight, timestamp)?;
        info!(airline = %call.caller, flight, timestamp, flight_key = %key, "Flight registered");
        Ok(key)
    }

    /// Buy insurance on a flight with the attached value as premium.
    pub fn buy(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        airline: &Address,
        flight: &str,
        timestamp: u64,
    ) -> SuretyResult<FlightKey> {
        Self::require_operational(store)?;

        let key = FlightKey::derive(airline, flight, timestamp);
        if !store.is_flight_registered(&key) {
            return Err(SuretyError::state("flight must be registered"));
        }
        if call.value == 0 {
            return Err(SuretyError::validation("cannot buy insurance without any value"));
        }
        if call.value > self.params.premium_cap {
            return Err(SuretyError::validation(format!(
                "cannot buy insurance valued at more than {}",
                amount::describe(self.params.premium_cap)
            )));
        }
        check(store, &call.caller, Operation::Buy)?;

        store.create_policy(&self.identity, &call.caller, key, call.value)?;
        info!(
            passenger = %call.caller,
            flight_key = %key,
            premium = %call.value,
            "Policy purchased"
        );
        Ok(key)
    }

    /// Withdraw the caller's credited payout for a flight.
    pub fn pay(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        bank: &mut dyn ValueTransfer,
        airline: &Address,
        flight: &str,
        timestamp: u64,
    ) -> SuretyResult<Wei> {
        Self::require_operational(store)?;

        let key = FlightKey::derive(airline, flight, timestamp);
        let paid = store.pay_insuree(&self.identity, &call.caller, &key, bank)?;
        info!(passenger = %call.caller, flight_key = %key, amount = %paid, "Payout sent");
        Ok(paid)
    }

    /// Enroll the caller as an oracle and assign its three indexes.
    pub fn register_oracle(&self, store: &mut DataStore, call: &mut Call) -> SuretyResult<[u8; 3]> {
        Self::require_operational(store)?;

        if call.value < self.params.oracle_registration_fee {
            return Err(SuretyError::validation("registration fee is required"));
        }
        if store.is_oracle_registered(&call.caller) {
            return Err(SuretyError::state("already registered as an oracle"));
        }

        let mut indexes = [0u8; 3];
        for slot in indexes.iter_mut() {
            *slot = self.draw_index(store, call)?;
        }

        store.register_oracle(&self.identity, &call.caller, indexes)?;
        info!(oracle = %call.caller, ?indexes, "Oracle registered");
        Ok(indexes)
    }

    /// Ask oracles holding a freshly drawn index for a flight's status.
    pub fn fetch_flight_status(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        airline: &Address,
        flight: &str,
        timestamp: u64,
    ) -> SuretyResult<u8> {
        Self::require_operational(store)?;

        let key = FlightKey::derive(airline, flight, timestamp);
        if !store.is_flight_registered(&key) {
            return Err(SuretyError::state("flight must be registered"));
        }

        let index = self.draw_index(store, call)?;
        let opened = store.open_status_request(&self.identity, index, &key, &call.caller)?;
        info!(index, flight_key = %key, opened, "Status request opened");

        call.emit(Event::OracleRequest {
            index,
            airline: airline.clone(),
            flight: flight.to_string(),
            timestamp,
        });
        Ok(index)
    }

    /// Record an oracle's report and settle the flight on quorum.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_oracle_response(
        &self,
        store: &mut DataStore,
        call: &mut Call,
        index: u8,
        airline: &Address,
        flight: &str,
        timestamp: u64,
        status: StatusCode,
    ) -> SuretyResult<Tally> {
        Self::require_operational(store)?;
        check(store, &call.caller, Operation::SubmitOracleResponse { index })?;

        let key = FlightKey::derive(airline, flight, timestamp);
        let tally = store.record_oracle_response(
            &self.identity,
            index,
            &key,
            &call.caller,
            status,
            self.params.oracle_quorum,
        )?;

        call.emit(Event::OracleReport {
            airline: airline.clone(),
            flight: flight.to_string(),
            timestamp,
            status,
        });

        if tally != Tally::Finalized {
            debug!(oracle = %call.caller, index, ?tally, "Oracle response recorded");
            return Ok(tally);
        }

        call.emit(Event::FlightStatusInfo {
            airline: airline.clone(),
            flight: flight.to_string(),
            timestamp,
            status,
        });

        let applied = store.finalize_flight_status(&self.identity, &key, status)?;
        info!(flight_key = %key, %status, applied, "Flight status finalized");

        if applied && status.triggers_payout() {
            store.credit_insurees(&self.identity, &key)?;
        }

        Ok(tally)
    }

    fn draw_index(&self, store: &mut DataStore, call: &Call) -> SuretyResult<u8> {
        let nonce = store.next_oracle_nonce(&self.identity)?;
        let seed = IndexSeed {
            caller: &call.caller,
            nonce,
            entropy: call.entropy,
        };
        Ok(self.index_source.draw(&seed, self.params.oracle_index_range))
    }
}
