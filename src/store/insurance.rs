use ahash::{AHashMap, AHashSet};
use serde::Serialize;

use crate::domain::amount::{self, Wei};
use crate::domain::{Address, FlightKey, PayoutRatio, SuretyError, SuretyResult};
use crate::ledger::ValueTransfer;

/// Identifies one policy: a passenger insures a flight at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyId {
    pub passenger: Address,
    pub flight: FlightKey,
}

impl PolicyId {
    pub fn new(passenger: Address, flight: FlightKey) -> Self {
        PolicyId { passenger, flight }
    }
}

/// A passenger's insurance on one flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsurancePolicy {
    pub passenger: Address,
    pub flight: FlightKey,

    #[serde(with = "amount::as_string")]
    pub premium: Wei,

    /// Credited by settlement, zeroed on withdrawal
    #[serde(with = "amount::as_string")]
    pub payout_credited: Wei,

    pub paid: bool,
}

/// Outcome of crediting the policies of one flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CreditSummary {
    /// Policies credited by this call
    pub policies: usize,

    /// Wei credited by this call
    #[serde(with = "amount::as_string")]
    pub total: Wei,
}

/// Exclusive claim on a policy for the duration of its payout transfer.
///
/// Released on drop, whether the transfer succeeded or not.
pub struct SettlementGuard<'a> {
    active: &'a mut AHashSet<PolicyId>,
    id: PolicyId,
}

impl<'a> SettlementGuard<'a> {
    pub fn acquire(active: &'a mut AHashSet<PolicyId>, id: PolicyId) -> SuretyResult<Self> {
        if !active.insert(id.clone()) {
            return Err(SuretyError::state(
                "a payout for this policy is already in progress",
            ));
        }
        Ok(SettlementGuard { active, id })
    }
}

impl Drop for SettlementGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.id);
    }
}

/// Passenger policies and credited-but-unwithdrawn payouts.
#[derive(Debug, Clone, Default)]
pub struct InsuranceEscrow {
    policies: AHashMap<PolicyId, InsurancePolicy>,
    /// Passengers insured per flight, in purchase order
    by_flight: AHashMap<FlightKey, Vec<Address>>,
    /// Policies whose payout transfer is in flight
    settling: AHashSet<PolicyId>,
}

impl InsuranceEscrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn policy(&self, passenger: &Address, flight: &FlightKey) -> Option<&InsurancePolicy> {
        self.policies.get(&PolicyId::new(passenger.clone(), *flight))
    }

    pub fn is_insured(&self, passenger: &Address, flight: &FlightKey) -> bool {
        self.policy(passenger, flight).is_some()
    }

    /// Policies written against a flight.
    pub fn policies_for(&self, flight: &FlightKey) -> Vec<&InsurancePolicy> {
        self.by_flight
            .get(flight)
            .into_iter()
            .flatten()
            .filter_map(|p| self.policy(p, flight))
            .collect()
    }

    /// Write a new policy.
    pub fn insure(
        &mut self,
        passenger: &Address,
        flight: FlightKey,
        premium: Wei,
    ) -> SuretyResult<()> {
        let id = PolicyId::new(passenger.clone(), flight);
        if self.policies.contains_key(&id) {
            return Err(SuretyError::state(
                "passenger already insured for this flight",
            ));
        }

        self.policies.insert(
            id,
            InsurancePolicy {
                passenger: passenger.clone(),
                flight,
                premium,
                payout_credited: 0,
                paid: false,
            },
        );
        self.by_flight.entry(flight).or_default().push(passenger.clone());
        Ok(())
    }

    /// Credit every uncredited, unpaid policy on a flight.
    ///
    /// Policies that already carry a credit or were paid are skipped, so
    /// repeated settlement never double-credits.
    pub fn credit(
        &mut self,
        flight: &FlightKey,
        ratio: PayoutRatio,
    ) -> SuretyResult<CreditSummary> {
        let mut summary = CreditSummary::default();

        let Some(passengers) = self.by_flight.get(flight) else {
            return Ok(summary);
        };

        for passenger in passengers {
            let id = PolicyId::new(passenger.clone(), *flight);
            let Some(policy) = self.policies.get_mut(&id) else {
                continue;
            };

            if policy.payout_credited != 0 || policy.paid {
                continue;
            }

            let payout = ratio
                .apply(policy.premium)
                .ok_or_else(|| SuretyError::validation("payout overflows"))?;

            policy.payout_credited = payout;
            summary.policies += 1;
            summary.total = summary
                .total
                .checked_add(payout)
                .ok_or_else(|| SuretyError::validation("payout overflows"))?;
        }

        Ok(summary)
    }

    /// Withdraw a credited payout from `pool` to the passenger.
    ///
    /// The settlement guard is taken first, then the policy is zeroed and
    /// marked paid before value moves. If the transfer fails the policy is
    /// restored and the error returned.
    pub fn withdraw(
        &mut self,
        passenger: &Address,
        flight: &FlightKey,
        pool: &Address,
        bank: &mut dyn ValueTransfer,
    ) -> SuretyResult<Wei> {
        let id = PolicyId::new(passenger.clone(), *flight);

        let policy = self
            .policies
            .get_mut(&id)
            .ok_or_else(|| SuretyError::state("passenger is not insured"))?;

        if policy.payout_credited == 0 {
            return Err(SuretyError::state(
                "there is no payment due for this passenger",
            ));
        }

        // Held until the transfer has returned
        let _guard = SettlementGuard::acquire(&mut self.settling, id)?;

        // Effects
        let owed = policy.payout_credited;
        policy.payout_credited = 0;
        policy.paid = true;

        // Interaction
        if let Err(e) = bank.transfer(pool, passenger, owed) {
            policy.payout_credited = owed;
            policy.paid = false;
            return Err(e.into());
        }

        Ok(owed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::amount::units;
    use crate::ledger::Balances;

    fn addr(s: &str) -> Address {
        Address::new(s)
    }

    fn flight(n: &str) -> FlightKey {
        FlightKey::derive(&addr("0xa1"), n, 1591878209161)
    }

    #[test]
    fn test_insure_once_per_flight() {
        let mut escrow = InsuranceEscrow::new();
        let passenger = addr("0xp1");

        escrow.insure(&passenger, flight("AC110"), units(1)).unwrap();
        assert!(escrow.is_insured(&passenger, &flight("AC110")));
        assert!(!escrow.is_insured(&passenger, &flight("AC111")));

        let err = escrow.insure(&passenger, flight("AC110"), 1).unwrap_err();
        assert_eq!(err.code(), "STATE_ERROR");
        assert_eq!(escrow.policy(&passenger, &flight("AC110")).unwrap().premium, units(1));

        // Same passenger, different flight is independent.
        escrow.insure(&passenger, flight("AC111"), 5).unwrap();
        assert!(escrow.is_insured(&passenger, &flight("AC111")));
    }

    #[test]
    fn test_credit_is_idempotent() {
        let mut escrow = InsuranceEscrow::new();
        escrow.insure(&addr("0xp1"), flight("AC110"), units(1)).unwrap();
        escrow.insure(&addr("0xp2"), flight("AC110"), 3).unwrap();
        escrow.insure(&addr("0xp3"), flight("AC111"), 10).unwrap();

        let summary = escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap();
        assert_eq!(summary.policies, 2);
        assert_eq!(summary.total, 1_500_000_000_000_000_000 + 4);

        let again = escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap();
        assert_eq!(again, CreditSummary::default());

        let p1 = escrow.policy(&addr("0xp1"), &flight("AC110")).unwrap();
        assert_eq!(p1.payout_credited, 1_500_000_000_000_000_000);
        // Other flights are untouched.
        assert_eq!(escrow.policy(&addr("0xp3"), &flight("AC111")).unwrap().payout_credited, 0);
    }

    #[test]
    fn test_credit_unknown_flight() {
        let mut escrow = InsuranceEscrow::new();
        let summary = escrow.credit(&flight("AC999"), PayoutRatio::STANDARD).unwrap();
        assert_eq!(summary.policies, 0);
    }

    #[test]
    fn test_withdraw_zeroes_before_transfer() {
        let pool = addr("0xdata");
        let mut bank = Balances::new();
        bank.mint(&pool, units(10)).unwrap();

        let mut escrow = InsuranceEscrow::new();
        let passenger = addr("0xp1");
        escrow.insure(&passenger, flight("AC110"), units(1)).unwrap();

        let err = escrow.withdraw(&passenger, &flight("AC110"), &pool, &mut bank).unwrap_err();
        assert_eq!(err, SuretyError::state("there is no payment due for this passenger"));

        escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap();
        let paid = escrow.withdraw(&passenger, &flight("AC110"), &pool, &mut bank).unwrap();

        assert_eq!(paid, 1_500_000_000_000_000_000);
        assert_eq!(bank.balance_of(&passenger), paid);
        let policy = escrow.policy(&passenger, &flight("AC110")).unwrap();
        assert_eq!(policy.payout_credited, 0);
        assert!(policy.paid);

        // Second withdrawal has nothing to pay, and a paid policy is never re-credited.
        assert!(escrow.withdraw(&passenger, &flight("AC110"), &pool, &mut bank).is_err());
        assert_eq!(escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap().policies, 0);
    }

    #[test]
    fn test_withdraw_not_insured() {
        let mut bank = Balances::new();
        let mut escrow = InsuranceEscrow::new();

        let err = escrow
            .withdraw(&addr("0xp2"), &flight("AC110"), &addr("0xdata"), &mut bank)
            .unwrap_err();
        assert_eq!(err, SuretyError::state("passenger is not insured"));
    }

    #[test]
    fn test_failed_transfer_restores_policy() {
        let pool = addr("0xdata");
        let mut bank = Balances::new();
        bank.mint(&pool, units(10)).unwrap();

        let mut escrow = InsuranceEscrow::new();
        let passenger = addr("0xp1");
        escrow.insure(&passenger, flight("AC110"), units(1)).unwrap();
        escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap();

        bank.refuse_deposits(&passenger);
        let err = escrow.withdraw(&passenger, &flight("AC110"), &pool, &mut bank).unwrap_err();
        assert_eq!(err.code(), "TRANSFER_ERROR");

        let policy = escrow.policy(&passenger, &flight("AC110")).unwrap();
        assert_eq!(policy.payout_credited, 1_500_000_000_000_000_000);
        assert!(!policy.paid);
        assert_eq!(bank.balance_of(&pool), units(10));

        // Guard was released, so a later attempt can go through.
        bank.accept_deposits(&passenger);
        assert!(escrow.withdraw(&passenger, &flight("AC110"), &pool, &mut bank).is_ok());
    }

    #[test]
    fn test_payout_in_progress_leaves_policy_untouched() {
        let pool = addr("0xdata");
        let mut bank = Balances::new();
        bank.mint(&pool, units(10)).unwrap();

        let mut escrow = InsuranceEscrow::new();
        let passenger = addr("0xp1");
        escrow.insure(&passenger, flight("AC110"), units(1)).unwrap();
        escrow.credit(&flight("AC110"), PayoutRatio::STANDARD).unwrap();

        escrow
            .settling
            .insert(PolicyId::new(passenger.clone(), flight("AC110")));
        let err = escrow
            .withdraw(&passenger, &flight("AC110"), &pool, &mut bank)
            .unwrap_err();
        assert_eq!(
            err,
            SuretyError::state("a payout for this policy is already in progress")
        );

        let policy = escrow.policy(&passenger, &flight("AC110")).unwrap();
        assert_eq!(policy.payout_credited, 1_500_000_000_000_000_000);
        assert!(!policy.paid);
        assert_eq!(bank.balance_of(&pool), units(10));
        assert_eq!(bank.balance_of(&passenger), 0);
    }

    #[test]
    fn test_settlement_guard_is_exclusive() {
        let mut active = AHashSet::new();
        let id = PolicyId::new(addr("0xp1"), flight("AC110"));

        {
            let _guard = SettlementGuard::acquire(&mut active, id.clone()).unwrap();
        }
        assert!(active.is_empty());

        active.insert(id.clone());
        assert!(SettlementGuard::acquire(&mut active, id).is_err());
    }
}
