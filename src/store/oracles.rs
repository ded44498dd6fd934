use ahash::AHashMap;
use serde::Serialize;
use smallvec::SmallVec;

use crate::domain::{Address, Flight, FlightKey, StatusCode, SuretyError, SuretyResult};

/// An enrolled oracle and the indexes it answers for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleRegistration {
    pub address: Address,
    pub indexes: [u8; 3],
}

/// Requests are opened per index, so the same flight may have several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub index: u8,
    pub flight: FlightKey,
}

/// Respondents grouped by the status they reported.
type Respondents = SmallVec<[Address; 4]>;

/// A status request and the responses collected for it.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub requester: Address,
    responses: AHashMap<StatusCode, Respondents>,
    finalized: Option<StatusCode>,
}

impl StatusRequest {
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    /// Status the request settled on, once finalized.
    pub fn outcome(&self) -> Option<StatusCode> {
        self.finalized
    }

    pub fn responses_for(&self, status: StatusCode) -> usize {
        self.responses.get(&status).map(|r| r.len()).unwrap_or(0)
    }
}

/// Result of recording one oracle response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tally", content = "responses", rename_all = "snake_case")]
pub enum Tally {
    /// Not yet at quorum; carries the agreeing responses so far
    Pending(usize),
    /// This response brought the status to quorum and finalized the request
    Finalized,
    /// The request had already settled; nothing was recorded
    AlreadyFinalized,
}

/// Oracle enrollment and per-request response collection.
#[derive(Debug, Clone, Default)]
pub struct OracleBoard {
    oracles: AHashMap<Address, OracleRegistration>,
    requests: AHashMap<RequestKey, StatusRequest>,
    nonce: u64,
}

impl OracleBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, oracle: &Address) -> bool {
        self.oracles.contains_key(oracle)
    }

    pub fn indexes_of(&self, oracle: &Address) -> Option<[u8; 3]> {
        self.oracles.get(oracle).map(|o| o.indexes)
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    pub fn request(&self, index: u8, flight: &FlightKey) -> Option<&StatusRequest> {
        self.requests.get(&RequestKey {
            index,
            flight: *flight,
        })
    }

    /// Take the next value of the draw counter.
    pub fn next_nonce(&mut self) -> u64 {
        let nonce = self.nonce;
        self.nonce = self.nonce.wrapping_add(1);
        nonce
    }

    /// Enroll an oracle. Indexes are fixed for life.
    pub fn register(&mut self, oracle: &Address, indexes: [u8; 3]) -> SuretyResult<()> {
        if self.oracles.contains_key(oracle) {
            return Err(SuretyError::state("already registered as an oracle"));
        }

        self.oracles.insert(
            oracle.clone(),
            OracleRegistration {
                address: oracle.clone(),
                indexes,
            },
        );
        Ok(())
    }

    /// Open a request for `flight` under `index`.
    ///
    /// An existing request under the same key is left as it is, responses
    /// included. Returns whether a new request was created.
    pub fn open_request(&mut self, index: u8, flight: &Flight, requester: &Address) -> bool {
        let key = RequestKey {
            index,
            flight: flight.key,
        };
        if self.requests.contains_key(&key) {
            return false;
        }

        self.requests.insert(
            key,
            StatusRequest {
                index,
                airline: flight.airline.clone(),
                flight: flight.flight.clone(),
                timestamp: flight.timestamp,
                requester: requester.clone(),
                responses: AHashMap::new(),
                finalized: None,
            },
        );
        true
    }

    /// Record `responder`'s report and evaluate quorum for that status.
    ///
    /// A responder counts once per status; repeating a report is accepted
    /// but does not move the tally.
    pub fn record_response(
        &mut self,
        index: u8,
        flight: &FlightKey,
        responder: &Address,
        status: StatusCode,
        quorum: usize,
    ) -> SuretyResult<Tally> {
        let request = self
            .requests
            .get_mut(&RequestKey {
                index,
                flight: *flight,
            })
            .ok_or_else(|| SuretyError::state("flight or timestamp do not match oracle request"))?;

        if request.finalized.is_some() {
            return Ok(Tally::AlreadyFinalized);
        }

        let respondents = request.responses.entry(status).or_default();
        if !respondents.contains(responder) {
            respondents.push(responder.clone());
        }

        if respondents.len() == quorum {
            request.finalized = Some(status);
            return Ok(Tally::Finalized);
        }

        Ok(Tally::Pending(respondents.len()))
    }
}
