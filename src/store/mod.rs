//! The data store: every piece of persistent protocol state.
//!
//! Reads are unrestricted. Every mutation checks the operational gate and
//! then requires the caller to be the authorized caller, which in a
//! deployed system is the rules engine's identity.

pub mod airlines;
pub mod flights;
pub mod gate;
pub mod insurance;
pub mod oracles;

pub use airlines::{Airline, AirlineRegistry};
pub use flights::FlightRegistry;
pub use gate::Gate;
pub use insurance::{CreditSummary, InsuranceEscrow, InsurancePolicy, PolicyId, SettlementGuard};
pub use oracles::{OracleBoard, OracleRegistration, RequestKey, StatusRequest, Tally};

use tracing::info;

use crate::domain::{
    Address, Flight, FlightKey, PayoutRatio, StatusCode, SuretyError, SuretyResult, Wei,
};
use crate::engine::capability::{self, Operation, RoleView};
use crate::ledger::ValueTransfer;

/// Persistent state of the insurance protocol.
///
/// Cloning is cheap enough for the ledger to snapshot it per call.
#[derive(Debug, Clone)]
pub struct DataStore {
    identity: Address,
    gate: Gate,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    insurance: InsuranceEscrow,
    oracles: OracleBoard,
    payout: PayoutRatio,
}

impl DataStore {
    /// A store with `first_airline` seeded as registered.
    ///
    /// No authorized caller is bound; the owner must bind one before any
    /// mutation can succeed.
    pub fn new(
        identity: Address,
        owner: Address,
        first_airline: Address,
        payout: PayoutRatio,
    ) -> Self {
        DataStore {
            identity,
            gate: Gate::new(owner),
            airlines: AirlineRegistry::seeded(first_airline),
            flights: FlightRegistry::new(),
            insurance: InsuranceEscrow::new(),
            oracles: OracleBoard::new(),
            payout,
        }
    }

    // ---- queries ----

    /// Account holding pooled value (antes, premiums, oracle fees).
    pub fn identity(&self) -> &Address {
        &self.identity
    }

    pub fn is_operational(&self) -> bool {
        self.gate.is_operational()
    }

    pub fn owner(&self) -> &Address {
        self.gate.owner()
    }

    pub fn authorized_caller(&self) -> Option<&Address> {
        self.gate.authorized_caller()
    }

    pub fn airline(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn is_airline_registered(&self, address: &Address) -> bool {
        self.airlines.is_registered(address)
    }

    pub fn is_airline_funded(&self, address: &Address) -> bool {
        self.airlines.is_funded(address)
    }

    pub fn registered_airline_count(&self) -> usize {
        self.airlines.registered_count()
    }

    pub fn flight(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn is_flight_registered(&self, key: &FlightKey) -> bool {
        self.flights.is_registered(key)
    }

    pub fn policy(&self, passenger: &Address, key: &FlightKey) -> Option<&InsurancePolicy> {
        self.insurance.policy(passenger, key)
    }

    pub fn is_passenger_insured(&self, passenger: &Address, key: &FlightKey) -> bool {
        self.insurance.is_insured(passenger, key)
    }

    pub fn policies_for(&self, key: &FlightKey) -> Vec<&InsurancePolicy> {
        self.insurance.policies_for(key)
    }

    pub fn oracle_indexes(&self, oracle: &Address) -> Option<[u8; 3]> {
        self.oracles.indexes_of(oracle)
    }

    pub fn is_oracle_registered(&self, oracle: &Address) -> bool {
        self.oracles.is_registered(oracle)
    }

    pub fn status_request(&self, index: u8, key: &FlightKey) -> Option<&StatusRequest> {
        self.oracles.request(index, key)
    }

    pub fn payout_ratio(&self) -> PayoutRatio {
        self.payout
    }

    // ---- owner commands ----

    /// Open or close the gate. Allowed while closed, so the owner can reopen.
    pub fn set_operational_status(&mut self, caller: &Address, mode: bool) -> SuretyResult<()> {
        capability::check(self, caller, Operation::SetOperationalStatus)?;
        self.gate.set_operational(mode);
        info!(operational = mode, "Operational status changed");
        Ok(())
    }

    /// Bind the identity allowed to mutate the store.
    pub fn set_authorized_caller(
        &mut self,
        caller: &Address,
        authorized: Address,
    ) -> SuretyResult<()> {
        capability::check(self, caller, Operation::SetAuthorizedCaller)?;
        info!(authorized = %authorized, "Authorized caller bound");
        self.gate.set_authorized_caller(authorized);
        Ok(())
    }

    // ---- authorized mutations ----

    fn authorize(&self, caller: &Address) -> SuretyResult<()> {
        self.gate.require_operational()?;
        capability::check(self, caller, Operation::WriteStore)
    }

    pub fn register_airline(&mut self, caller: &Address, candidate: &Address) -> SuretyResult<()> {
        self.authorize(caller)?;
        self.airlines.register(candidate)
    }

    /// Returns the candidate's vote count after this vote.
    pub fn record_airline_vote(
        &mut self,
        caller: &Address,
        candidate: &Address,
        voter: &Address,
    ) -> SuretyResult<usize> {
        self.authorize(caller)?;
        self.airlines.record_vote(candidate, voter)
    }

    pub fn mark_airline_funded(&mut self, caller: &Address, airline: &Address) -> SuretyResult<()> {
        self.authorize(caller)?;
        self.airlines.mark_funded(airline)
    }

    pub fn register_flight(
        &mut self,
        caller: &Address,
        airline: &Address,
        flight: &str,
        timestamp: u64,
    ) -> SuretyResult<FlightKey> {
        self.authorize(caller)?;
        Ok(self.flights.register(airline, flight, timestamp))
    }

    /// Returns `false` if the flight had already settled on a status.
    pub fn finalize_flight_status(
        &mut self,
        caller: &Address,
        key: &FlightKey,
        status: StatusCode,
    ) -> SuretyResult<bool> {
        self.authorize(caller)?;
        self.flights.finalize_status(key, status)
    }

    pub fn create_policy(
        &mut self,
        caller: &Address,
        passenger: &Address,
        key: FlightKey,
        premium: Wei,
    ) -> SuretyResult<()> {
        self.authorize(caller)?;
        self.insurance.insure(passenger, key, premium)
    }

    /// Credit uncredited policies on a flight at the store's payout ratio.
    pub fn credit_insurees(
        &mut self,
        caller: &Address,
        key: &FlightKey,
    ) -> SuretyResult<CreditSummary> {
        self.authorize(caller)?;
        let summary = self.insurance.credit(key, self.payout)?;
        if summary.policies > 0 {
            info!(
                flight_key = %key,
                policies = summary.policies,
                total_wei = %summary.total,
                "Insurees credited"
            );
        }
        Ok(summary)
    }

    /// Send a passenger's credited payout out of the pool.
    pub fn pay_insuree(
        &mut self,
        caller: &Address,
        passenger: &Address,
        key: &FlightKey,
        bank: &mut dyn ValueTransfer,
    ) -> SuretyResult<Wei> {
        self.authorize(caller)?;
        self.insurance.withdraw(passenger, key, &self.identity, bank)
    }

    pub fn register_oracle(
        &mut self,
        caller: &Address,
        oracle: &Address,
        indexes: [u8; 3],
    ) -> SuretyResult<()> {
        self.authorize(caller)?;
        self.oracles.register(oracle, indexes)
    }

    pub fn next_oracle_nonce(&mut self, caller: &Address) -> SuretyResult<u64> {
        self.authorize(caller)?;
        Ok(self.oracles.next_nonce())
    }

    /// Open a status request for a registered flight.
    pub fn open_status_request(
        &mut self,
        caller: &Address,
        index: u8,
        key: &FlightKey,
        requester: &Address,
    ) -> SuretyResult<bool> {
        self.authorize(caller)?;
        let flight = self
            .flights
            .get(key)
            .filter(|f| f.registered)
            .ok_or_else(|| SuretyError::state("flight must be registered"))?;
        Ok(self.oracles.open_request(index, flight, requester))
    }

    pub fn record_oracle_response(
        &mut self,
        caller: &Address,
        index: u8,
        key: &FlightKey,
        responder: &Address,
        status: StatusCode,
        quorum: usize,
    ) -> SuretyResult<Tally> {
        self.authorize(caller)?;
        self.oracles.record_response(index, key, responder, status, quorum)
    }
}

impl RoleView for DataStore {
    fn owner(&self) -> &Address {
        self.gate.owner()
    }

    fn authorized_caller(&self) -> Option<&Address> {
        self.gate.authorized_caller()
    }

    fn is_airline_registered(&self, airline: &Address) -> bool {
        self.airlines.is_registered(airline)
    }

    fn is_airline_funded(&self, airline: &Address) -> bool {
        self.airlines.is_funded(airline)
    }

    fn oracle_indexes(&self, oracle: &Address) -> Option<[u8; 3]> {
        self.oracles.indexes_of(oracle)
    }
}
