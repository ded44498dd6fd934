//! In-process stand-in for the ledger the protocol runs on.
//!
//! Calls are executed one at a time. Each call is charged a flat fee,
//! has its attached value moved into the pool, and then runs against a
//! snapshot of the store and balances; on error the snapshot is restored
//! so a call either commits entirely or leaves no trace beyond its fee.

pub mod balances;
pub mod command;

pub use balances::{Balances, TransferError, ValueTransfer};
pub use command::{Command, Target};

use ahash::AHashSet;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::amount::{self, Wei};
use crate::domain::{Address, Event, EventRecord, FlightKey, SuretyError, SuretyResult};
use crate::engine::{Admission, Call, RulesEngine};
use crate::store::{CreditSummary, DataStore, Tally};

/// What a committed call returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Outcome {
    None,
    Admission(Admission),
    FlightKey(FlightKey),
    /// A policy was bought on this flight
    Insured(FlightKey),
    Paid {
        #[serde(with = "amount::as_string")]
        amount: Wei,
    },
    Credited(CreditSummary),
    OracleIndexes([u8; 3]),
    RequestIndex(u8),
    Response(Tally),
}

/// Record of a committed call.
#[derive(Debug, Clone, Serialize)]
pub struct Receipt {
    pub tx_id: Uuid,
    pub sequence: u64,
    pub caller: Address,
    pub method: &'static str,

    /// Fee charged to the caller
    #[serde(with = "amount::as_string")]
    pub fee: Wei,

    pub outcome: Outcome,
    pub events: Vec<Event>,
    pub committed_at: DateTime<Utc>,
}

/// A call that was rolled back.
#[derive(Error, Debug, Clone)]
#[error("{method} reverted: {error}")]
pub struct Revert {
    pub tx_id: Uuid,
    pub sequence: u64,
    pub caller: Address,
    pub method: &'static str,
    /// Fee kept despite the revert
    pub fee: Wei,
    pub error: SuretyError,
}

/// Serial executor over one data store and one rules engine.
#[derive(Debug)]
pub struct Ledger {
    store: DataStore,
    app: RulesEngine,
    balances: Balances,
    fee_per_call: Wei,
    sequence: u64,
    entropy: [u8; 32],
    log: Vec<EventRecord>,
    /// Store and engine identities, current and replaced; they never originate calls
    contracts: AHashSet<Address>,
}

impl Ledger {
    pub fn new(
        store: DataStore,
        app: RulesEngine,
        balances: Balances,
        fee_per_call: Wei,
    ) -> Self {
        let entropy = Sha256::digest(store.identity().as_str().as_bytes()).into();
        let contracts = [store.identity().clone(), app.identity().clone()]
            .into_iter()
            .collect();

        Ledger {
            store,
            app,
            balances,
            fee_per_call,
            sequence: 0,
            entropy,
            log: Vec::new(),
            contracts,
        }
    }

    pub fn store(&self) -> &DataStore {
        &self.store
    }

    pub fn app(&self) -> &RulesEngine {
        &self.app
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn balance_of(&self, account: &Address) -> Wei {
        self.balances.balance_of(account)
    }

    pub fn fee_per_call(&self) -> Wei {
        self.fee_per_call
    }

    /// Sequence number of the last executed call.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Credit an account outside of any call.
    pub fn mint(&mut self, account: &Address, amount: Wei) -> Result<(), TransferError> {
        self.balances.mint(account, amount)
    }

    /// Mark an account as refusing incoming value.
    pub fn refuse_deposits(&mut self, account: &Address) {
        self.balances.refuse_deposits(account);
    }

    /// Swap in a new rules engine, returning the old one.
    ///
    /// The store keeps its authorized caller; the new engine cannot write
    /// until the owner binds its identity.
    pub fn replace_app(&mut self, app: RulesEngine) -> RulesEngine {
        self.contracts.insert(app.identity().clone());
        std::mem::replace(&mut self.app, app)
    }

    /// Events recorded after `since`, oldest first.
    pub fn events_since(&self, since: u64, limit: usize) -> Vec<EventRecord> {
        let start = usize::try_from(since).unwrap_or(usize::MAX).min(self.log.len());
        self.log[start..].iter().take(limit).cloned().collect()
    }

    /// Sequence of the newest recorded event, 0 if none.
    pub fn last_event_sequence(&self) -> u64 {
        self.log.len() as u64
    }

    /// Execute one call to completion or rollback.
    pub fn execute(
        &mut self,
        caller: Address,
        value: Wei,
        command: Command,
    ) -> Result<Receipt, Revert> {
        self.sequence += 1;
        let sequence = self.sequence;
        let tx_id = Uuid::new_v4();
        let method = command.name();
        self.advance_entropy(&caller);

        let revert = |fee: Wei, error: SuretyError| Revert {
            tx_id,
            sequence,
            caller: caller.clone(),
            method,
            fee,
            error,
        };

        if self.contracts.contains(&caller) {
            warn!(sequence, %caller, method, "Call rejected: contract identity as caller");
            return Err(revert(
                0,
                SuretyError::authorization("calls cannot originate from a contract identity"),
            ));
        }

        if let Err(e) = self.balances.burn(&caller, self.fee_per_call) {
            warn!(sequence, %caller, method, error = %e, "Call rejected: fee not covered");
            return Err(revert(0, e.into()));
        }
        let fee = self.fee_per_call;

        let store_snapshot = self.store.clone();
        let balances_snapshot = self.balances.clone();

        let mut call = Call::new(caller.clone(), value).with_entropy(self.entropy);
        match self.run(&mut call, &command) {
            Ok(outcome) => {
                let committed_at = Utc::now();
                for event in &call.events {
                    self.log.push(EventRecord {
                        sequence: self.log.len() as u64 + 1,
                        tx_id,
                        recorded_at: committed_at,
                        event: event.clone(),
                    });
                }

                debug!(sequence, %caller, method, events = call.events.len(), "Call committed");
                Ok(Receipt {
                    tx_id,
                    sequence,
                    caller: call.caller,
                    method,
                    fee,
                    outcome,
                    events: call.events,
                    committed_at,
                })
            }
            Err(error) => {
                self.store = store_snapshot;
                self.balances = balances_snapshot;

                warn!(
                    sequence,
                    %caller,
                    method,
                    code = error.code(),
                    reason = %error,
                    "Call reverted"
                );
                Err(revert(fee, error))
            }
        }
    }

    fn run(&mut self, call: &mut Call, command: &Command) -> SuretyResult<Outcome> {
        if call.value > 0 {
            if !command.is_payable() {
                return Err(SuretyError::validation("function is not payable"));
            }
            self.balances
                .transfer(&call.caller, self.store.identity(), call.value)?;
        }

        let Ledger {
            store,
            app,
            balances,
            ..
        } = self;

        match command {
            Command::SetOperationalStatus { mode } => {
                store.set_operational_status(&call.caller, *mode)?;
                Ok(Outcome::None)
            }
            Command::SetAuthorizedCaller { caller } => {
                store.set_authorized_caller(&call.caller, caller.clone())?;
                Ok(Outcome::None)
            }
            Command::CreditInsurees {
                airline,
                flight,
                timestamp,
            } => {
                let key = FlightKey::derive(airline, flight, *timestamp);
                store.credit_insurees(&call.caller, &key).map(Outcome::Credited)
            }
            Command::RegisterAirline { airline } => {
                app.register_airline(store, call, airline).map(Outcome::Admission)
            }
            Command::Fund => {
                app.fund(store, call)?;
                Ok(Outcome::None)
            }
            Command::RegisterFlight { flight, timestamp } => {
                app.register_flight(store, call, flight, *timestamp).map(Outcome::FlightKey)
            }
            Command::Buy {
                airline,
                flight,
                timestamp,
            } => app.buy(store, call, airline, flight, *timestamp).map(Outcome::Insured),
            Command::Pay {
                airline,
                flight,
                timestamp,
            } => app
                .pay(store, call, balances, airline, flight, *timestamp)
                .map(|amount| Outcome::Paid { amount }),
            Command::RegisterOracle => app.register_oracle(store, call).map(Outcome::OracleIndexes),
            Command::FetchFlightStatus {
                airline,
                flight,
                timestamp,
            } => app
                .fetch_flight_status(store, call, airline, flight, *timestamp)
                .map(Outcome::RequestIndex),
            Command::SubmitOracleResponse {
                index,
                airline,
                flight,
                timestamp,
                status,
            } => app
                .submit_oracle_response(store, call, *index, airline, flight, *timestamp, *status)
                .map(Outcome::Response),
        }
    }

    /// Chain the previous entropy with this call's position and caller.
    fn advance_entropy(&mut self, caller: &Address) {
        let mut hasher = Sha256::new();
        hasher.update(self.entropy);
        hasher.update(self.sequence.to_be_bytes());
        hasher.update(caller.as_str().as_bytes());
        self.entropy = hasher.finalize().into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::amount::units;
    use crate::domain::{Parameters, PayoutRatio, StatusCode};
    use crate::engine::ScriptedIndexSource;

    const FLIGHT: &str = "AC110";
    const TS: u64 = 1591878209161;
    const FEE: Wei = 21_000 * 1_000_000_000;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn ledger(fee: Wei) -> (Ledger, Arc<ScriptedIndexSource>) {
        let scripted = Arc::new(ScriptedIndexSource::default());
        let app =
            RulesEngine::with_index_source(addr("0xapp"), Parameters::default(), scripted.clone());
        let store = DataStore::new(
            addr("0xdata"),
            addr("0xowner"),
            addr("0xa1"),
            PayoutRatio::STANDARD,
        );

        let mut balances = Balances::new();
        for account in ["0xowner", "0xa1", "0xp1", "0xp2", "0xo1", "0xo2", "0xo3", "0xo4"] {
            balances.mint(&addr(account), units(100)).unwrap();
        }

        let mut ledger = Ledger::new(store, app, balances, fee);
        ledger
            .execute(addr("0xowner"), 0, Command::SetAuthorizedCaller { caller: addr("0xapp") })
            .unwrap();
        (ledger, scripted)
    }

    fn flight_args() -> (Address, String, u64) {
        (addr("0xa1"), FLIGHT.to_string(), TS)
    }

    fn buy() -> Command {
        let (airline, flight, timestamp) = flight_args();
        Command::Buy {
            airline,
            flight,
            timestamp,
        }
    }

    fn pay() -> Command {
        let (airline, flight, timestamp) = flight_args();
        Command::Pay {
            airline,
            flight,
            timestamp,
        }
    }

    fn submit(index: u8, status: StatusCode) -> Command {
        let (airline, flight, timestamp) = flight_args();
        Command::SubmitOracleResponse {
            index,
            airline,
            flight,
            timestamp,
            status,
        }
    }

    fn fetch() -> Command {
        let (airline, flight, timestamp) = flight_args();
        Command::FetchFlightStatus {
            airline,
            flight,
            timestamp,
        }
    }

    fn register_flight() -> Command {
        Command::RegisterFlight {
            flight: FLIGHT.to_string(),
            timestamp: TS,
        }
    }

    #[test]
    fn test_end_to_end_late_airline_payout() {
        crate::observability::tracing::init_test_tracing();
        let (mut ledger, scripted) = ledger(FEE);
        let passenger = addr("0xp1");
        let key = FlightKey::derive(&addr("0xa1"), FLIGHT, TS);

        ledger.execute(addr("0xa1"), units(10), Command::Fund).unwrap();
        let registered = ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        assert_eq!(registered.outcome, Outcome::FlightKey(key));
        let bought = ledger.execute(passenger.clone(), units(1), buy()).unwrap();
        assert_eq!(bought.outcome, Outcome::Insured(key));

        for oracle in ["0xo1", "0xo2", "0xo3"] {
            scripted.push([4, 1, 8]);
            ledger.execute(addr(oracle), units(1), Command::RegisterOracle).unwrap();
        }

        scripted.push([4]);
        let receipt = ledger.execute(passenger.clone(), 0, fetch()).unwrap();
        assert_eq!(receipt.outcome, Outcome::RequestIndex(4));

        for oracle in ["0xo1", "0xo2", "0xo3"] {
            ledger.execute(addr(oracle), 0, submit(4, StatusCode::LateAirline)).unwrap();
        }

        let policy = ledger.store().policy(&passenger, &key).unwrap();
        assert_eq!(policy.payout_credited, 1_500_000_000_000_000_000);

        let before = ledger.balance_of(&passenger);
        let receipt = ledger.execute(passenger.clone(), 0, pay()).unwrap();
        assert_eq!(
            receipt.outcome,
            Outcome::Paid {
                amount: 1_500_000_000_000_000_000
            }
        );
        assert_eq!(ledger.balance_of(&passenger), before + 1_500_000_000_000_000_000 - receipt.fee);
        assert_eq!(receipt.fee, FEE);

        let revert = ledger.execute(passenger.clone(), 0, pay()).unwrap_err();
        assert_eq!(
            revert.error,
            SuretyError::state("there is no payment due for this passenger")
        );
    }

    #[test]
    fn test_revert_restores_state_but_keeps_fee() {
        let (mut ledger, _) = ledger(FEE);
        ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();

        let before = ledger.balance_of(&addr("0xp1"));
        let pool_before = ledger.balance_of(&addr("0xdata"));

        // Over the cap: the premium is deposited, then the call fails.
        let revert = ledger.execute(addr("0xp1"), units(2), buy()).unwrap_err();
        assert_eq!(revert.error.code(), "VALIDATION_ERROR");
        assert_eq!(revert.fee, FEE);

        assert_eq!(ledger.balance_of(&addr("0xp1")), before - FEE);
        assert_eq!(ledger.balance_of(&addr("0xdata")), pool_before);
        assert!(!ledger
            .store()
            .is_passenger_insured(&addr("0xp1"), &FlightKey::derive(&addr("0xa1"), FLIGHT, TS)));
    }

    #[test]
    fn test_value_on_non_payable_call() {
        let (mut ledger, _) = ledger(0);

        let revert = ledger.execute(addr("0xa1"), 5, register_flight()).unwrap_err();
        assert_eq!(revert.error, SuretyError::validation("function is not payable"));
        assert_eq!(ledger.balance_of(&addr("0xa1")), units(100));
        assert_eq!(ledger.store().flight(&FlightKey::derive(&addr("0xa1"), FLIGHT, TS)), None);
    }

    #[test]
    fn test_value_beyond_balance() {
        let (mut ledger, _) = ledger(0);

        let revert = ledger.execute(addr("0xa1"), units(101), Command::Fund).unwrap_err();
        assert_eq!(revert.error.code(), "TRANSFER_ERROR");
        assert!(!ledger.store().is_airline_funded(&addr("0xa1")));
    }

    #[test]
    fn test_fee_not_covered() {
        let (mut ledger, _) = ledger(FEE);

        let revert = ledger.execute(addr("0xbroke"), 0, Command::Fund).unwrap_err();
        assert_eq!(revert.fee, 0);
        assert_eq!(revert.error.code(), "TRANSFER_ERROR");
    }

    #[test]
    fn test_failed_payout_rolls_back() {
        let (mut ledger, scripted) = ledger(0);
        let passenger = addr("0xp1");
        let key = FlightKey::derive(&addr("0xa1"), FLIGHT, TS);

        ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        ledger.execute(passenger.clone(), units(1), buy()).unwrap();
        for oracle in ["0xo1", "0xo2", "0xo3"] {
            scripted.push([2, 2, 2]);
            ledger.execute(addr(oracle), units(1), Command::RegisterOracle).unwrap();
        }
        scripted.push([2]);
        ledger.execute(passenger.clone(), 0, fetch()).unwrap();
        for oracle in ["0xo1", "0xo2", "0xo3"] {
            ledger.execute(addr(oracle), 0, submit(2, StatusCode::LateAirline)).unwrap();
        }

        ledger.refuse_deposits(&passenger);
        let revert = ledger.execute(passenger.clone(), 0, pay()).unwrap_err();
        assert_eq!(revert.error.code(), "TRANSFER_ERROR");

        let policy = ledger.store().policy(&passenger, &key).unwrap();
        assert_eq!(policy.payout_credited, 1_500_000_000_000_000_000);
        assert!(!policy.paid);
    }

    #[test]
    fn test_events_are_logged_in_order() {
        let (mut ledger, scripted) = ledger(0);
        ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        for oracle in ["0xo1", "0xo2", "0xo3"] {
            scripted.push([5, 5, 5]);
            ledger.execute(addr(oracle), units(1), Command::RegisterOracle).unwrap();
        }
        scripted.push([5]);
        ledger.execute(addr("0xp1"), 0, fetch()).unwrap();
        for oracle in ["0xo1", "0xo2", "0xo3"] {
            ledger.execute(addr(oracle), 0, submit(5, StatusCode::OnTime)).unwrap();
        }

        // request + 3 reports + finalized status
        assert_eq!(ledger.last_event_sequence(), 5);

        let all = ledger.events_since(0, 100);
        let names: Vec<_> = all.iter().map(|r| r.event.name()).collect();
        assert_eq!(
            names,
            vec![
                "oracle_request",
                "oracle_report",
                "oracle_report",
                "oracle_report",
                "flight_status_info"
            ]
        );
        assert_eq!(all[0].sequence, 1);

        let page = ledger.events_since(3, 1);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].sequence, 4);
        assert!(ledger.events_since(5, 10).is_empty());
        assert!(ledger.events_since(99, 10).is_empty());
    }

    #[test]
    fn test_reverted_call_emits_nothing() {
        let (mut ledger, _) = ledger(0);

        // Flight was never registered.
        assert!(ledger.execute(addr("0xp1"), 0, fetch()).is_err());
        assert_eq!(ledger.last_event_sequence(), 0);
    }

    #[test]
    fn test_credit_insurees_requires_authorized_caller() {
        let (mut ledger, _) = ledger(0);
        ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        ledger.execute(addr("0xp1"), units(1), buy()).unwrap();

        let (airline, flight, timestamp) = flight_args();
        let credit = Command::CreditInsurees {
            airline,
            flight,
            timestamp,
        };

        let revert = ledger.execute(addr("0xp1"), 0, credit.clone()).unwrap_err();
        assert_eq!(revert.error.code(), "AUTHORIZATION_ERROR");

        // An operator bound as authorized caller may credit directly.
        ledger
            .execute(
                addr("0xowner"),
                0,
                Command::SetAuthorizedCaller {
                    caller: addr("0xops"),
                },
            )
            .unwrap();
        let receipt = ledger.execute(addr("0xops"), 0, credit).unwrap();
        assert_eq!(
            receipt.outcome,
            Outcome::Credited(CreditSummary {
                policies: 1,
                total: 1_500_000_000_000_000_000,
            })
        );
    }

    #[test]
    fn test_contract_identities_cannot_originate_calls() {
        let (mut ledger, _) = ledger(FEE);
        let key = FlightKey::derive(&addr("0xa1"), FLIGHT, TS);
        ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        ledger.execute(addr("0xp1"), units(1), buy()).unwrap();
        ledger.mint(&addr("0xapp"), units(1)).unwrap();

        let (airline, flight, timestamp) = flight_args();
        let credit = Command::CreditInsurees {
            airline,
            flight,
            timestamp,
        };

        for identity in ["0xapp", "0xdata"] {
            let before = ledger.balance_of(&addr(identity));
            let revert = ledger.execute(addr(identity), 0, credit.clone()).unwrap_err();
            assert_eq!(
                revert.error,
                SuretyError::authorization("calls cannot originate from a contract identity")
            );
            assert_eq!(revert.fee, 0);
            assert_eq!(ledger.balance_of(&addr(identity)), before);
        }

        // Nothing was credited without a quorum, so there is nothing to withdraw.
        let policy = ledger.store().policy(&addr("0xp1"), &key).unwrap();
        assert_eq!(policy.payout_credited, 0);
        assert!(!ledger.store().flight(&key).unwrap().is_finalized);
        let revert = ledger.execute(addr("0xp1"), 0, pay()).unwrap_err();
        assert_eq!(
            revert.error,
            SuretyError::state("there is no payment due for this passenger")
        );
    }

    #[test]
    fn test_operational_gate() {
        let (mut ledger, _) = ledger(0);

        ledger
            .execute(addr("0xowner"), 0, Command::SetOperationalStatus { mode: false })
            .unwrap();
        let revert = ledger.execute(addr("0xa1"), 0, register_flight()).unwrap_err();
        assert_eq!(revert.error, SuretyError::Operational);

        let revert = ledger
            .execute(addr("0xa1"), 0, Command::SetOperationalStatus { mode: true })
            .unwrap_err();
        assert_eq!(revert.error.code(), "AUTHORIZATION_ERROR");

        ledger
            .execute(addr("0xowner"), 0, Command::SetOperationalStatus { mode: true })
            .unwrap();
        assert!(ledger.execute(addr("0xa1"), 0, register_flight()).is_ok());
    }

    #[test]
    fn test_replace_app_requires_rebinding() {
        let (mut ledger, _) = ledger(0);
        let upgraded = RulesEngine::new(addr("0xapp2"), Parameters::default());

        let old = ledger.replace_app(upgraded);
        assert_eq!(old.identity(), &addr("0xapp"));

        // Both the retired and the new engine stay barred from originating calls.
        for identity in ["0xapp", "0xapp2"] {
            let revert = ledger.execute(addr(identity), 0, register_flight()).unwrap_err();
            assert_eq!(revert.error.code(), "AUTHORIZATION_ERROR");
        }

        let revert = ledger.execute(addr("0xa1"), 0, register_flight()).unwrap_err();
        assert_eq!(revert.error, SuretyError::authorization("caller is not authorized"));

        ledger
            .execute(addr("0xowner"), 0, Command::SetAuthorizedCaller { caller: addr("0xapp2") })
            .unwrap();
        assert!(ledger.execute(addr("0xa1"), 0, register_flight()).is_ok());
        assert!(ledger.store().is_airline_registered(&addr("0xa1")));
    }

    #[test]
    fn test_sequence_counts_every_call() {
        let (mut ledger, _) = ledger(0);
        assert_eq!(ledger.sequence(), 1);

        let _ = ledger.execute(addr("0xp1"), 0, Command::Fund);
        let receipt = ledger.execute(addr("0xa1"), 0, register_flight()).unwrap();
        assert_eq!(receipt.sequence, 3);
        assert_eq!(receipt.method, "register_flight");
    }
}
