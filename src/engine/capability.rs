use crate::domain::{Address, SuretyError, SuretyResult};

/// Read-only view of the role sets a capability check needs.
pub trait RoleView {
    fn owner(&self) -> &Address;
    fn authorized_caller(&self) -> Option<&Address>;
    fn is_airline_registered(&self, airline: &Address) -> bool;
    fn is_airline_funded(&self, airline: &Address) -> bool;
    fn oracle_indexes(&self, oracle: &Address) -> Option<[u8; 3]>;
}

/// Operations that carry a caller-role requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Owner-only gate and boundary administration
    SetOperationalStatus,
    SetAuthorizedCaller,
    /// Any data-store mutation
    WriteStore,
    RegisterAirline,
    /// Casting a registration vote once bootstrap is over
    VoteForAirline,
    Fund,
    RegisterFlight,
    Buy,
    SubmitOracleResponse { index: u8 },
}

/// Decide whether `caller` may perform `op`.
///
/// Pure function of the role sets: no state is touched. The error
/// kind follows what a rejected caller is told for that operation.
pub fn check<V: RoleView + ?Sized>(view: &V, caller: &Address, op: Operation) -> SuretyResult<()> {
    match op {
        Operation::SetOperationalStatus | Operation::SetAuthorizedCaller => {
            if caller != view.owner() {
                return Err(SuretyError::authorization("caller is not contract owner"));
            }
        }
        Operation::WriteStore => {
            if view.authorized_caller() != Some(caller) {
                return Err(SuretyError::authorization("caller is not authorized"));
            }
        }
        Operation::RegisterAirline | Operation::RegisterFlight => {
            if !view.is_airline_registered(caller) {
                return Err(SuretyError::authorization(
                    "caller must be a registered airline",
                ));
            }
        }
        Operation::VoteForAirline => {
            if !view.is_airline_funded(caller) {
                return Err(SuretyError::state(
                    "airline cannot vote until it funds the contract",
                ));
            }
        }
        Operation::Fund => {
            if !view.is_airline_registered(caller) {
                return Err(SuretyError::state(
                    "only registered airlines can fund the contract",
                ));
            }
        }
        Operation::Buy => {
            if view.is_airline_registered(caller) {
                return Err(SuretyError::validation(
                    "airlines cannot purchase passenger insurance",
                ));
            }
        }
        Operation::SubmitOracleResponse { index } => {
            let holds = view
                .oracle_indexes(caller)
                .map(|indexes| indexes.contains(&index))
                .unwrap_or(false);
            if !holds {
                return Err(SuretyError::validation(
                    "index does not match oracle request",
                ));
            }
        }
    }

    Ok(())
}
