use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::domain::{Address, SuretyError, SuretyResult};

/// An airline known to the registry.
///
/// Entries are created on the first registration attempt that names
/// them and are never removed.
#[derive(Debug, Clone, Serialize)]
pub struct Airline {
    pub address: Address,
    pub registered: bool,
    pub funded: bool,

    /// Distinct airlines that voted for admission while pending
    #[serde(skip)]
    votes: AHashSet<Address>,
}

impl Airline {
    fn new(address: Address) -> Self {
        Airline {
            address,
            registered: false,
            funded: false,
            votes: AHashSet::new(),
        }
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn has_vote_from(&self, voter: &Address) -> bool {
        self.votes.contains(voter)
    }
}

/// Registration and funding state of every airline.
#[derive(Debug, Clone)]
pub struct AirlineRegistry {
    airlines: AHashMap<Address, Airline>,
    registered_count: usize,
}

impl AirlineRegistry {
    /// Registry with a single bootstrap airline already registered.
    pub fn seeded(first_airline: Address) -> Self {
        let mut airline = Airline::new(first_airline.clone());
        airline.registered = true;

        let mut airlines = AHashMap::new();
        airlines.insert(first_airline, airline);

        AirlineRegistry {
            airlines,
            registered_count: 1,
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.airlines.get(address).map(|a| a.registered).unwrap_or(false)
    }

    pub fn is_funded(&self, address: &Address) -> bool {
        self.airlines.get(address).map(|a| a.funded).unwrap_or(false)
    }

    pub fn registered_count(&self) -> usize {
        self.registered_count
    }

    pub fn votes_for(&self, candidate: &Address) -> usize {
        self.airlines.get(candidate).map(|a| a.vote_count()).unwrap_or(0)
    }

    /// Registered airlines, in no particular order.
    pub fn registered(&self) -> impl Iterator<Item = &Airline> {
        self.airlines.values().filter(|a| a.registered)
    }

    /// Transition a candidate to Registered and reset its vote set.
    pub fn register(&mut self, candidate: &Address) -> SuretyResult<()> {
        let airline = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| Airline::new(candidate.clone()));

        if airline.registered {
            return Err(SuretyError::state("airline is already registered"));
        }

        airline.registered = true;
        airline.votes.clear();
        self.registered_count += 1;
        Ok(())
    }

    /// Add `voter` to the candidate's vote set, returning the new count.
    pub fn record_vote(&mut self, candidate: &Address, voter: &Address) -> SuretyResult<usize> {
        let airline = self
            .airlines
            .entry(candidate.clone())
            .or_insert_with(|| Airline::new(candidate.clone()));

        if airline.registered {
            return Err(SuretyError::state("airline is already registered"));
        }

        if !airline.votes.insert(voter.clone()) {
            return Err(SuretyError::state(
                "caller already voted to register this airline",
            ));
        }

        Ok(airline.votes.len())
    }

    /// Mark a registered airline as funded. Funding is never revoked.
    pub fn mark_funded(&mut self, address: &Address) -> SuretyResult<()> {
        match self.airlines.get_mut(address) {
            Some(airline) if airline.registered => {
                airline.funded = true;
                Ok(())
            }
            _ => Err(SuretyError::state(
                "only registered airlines can fund the contract",
            )),
        }
    }
}
