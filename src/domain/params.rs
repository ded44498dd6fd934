use serde::{Deserialize, Serialize};

use super::amount::{self, Wei};

/// Payout as a fraction of the premium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRatio {
    pub numerator: u128,
    pub denominator: u128,
}

impl PayoutRatio {
    /// 150% of the premium.
    pub const STANDARD: PayoutRatio = PayoutRatio {
        numerator: 3,
        denominator: 2,
    };

    /// Scale a premium, returning `None` on overflow or a zero denominator.
    pub fn apply(&self, premium: Wei) -> Option<Wei> {
        premium
            .checked_mul(self.numerator)?
            .checked_div(self.denominator)
    }
}

impl Default for PayoutRatio {
    fn default() -> Self {
        PayoutRatio::STANDARD
    }
}

/// Protocol parameters fixed at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Value an airline deposits to become voting-eligible
    #[serde(with = "amount::as_units")]
    pub airline_ante: Wei,

    /// Largest premium a passenger may pay for one policy
    #[serde(with = "amount::as_units")]
    pub premium_cap: Wei,

    /// Fee an oracle pays to enroll
    #[serde(with = "amount::as_units")]
    pub oracle_registration_fee: Wei,

    /// Agreeing responses needed to finalize a status request
    pub oracle_quorum: usize,

    /// Oracle indexes are drawn from `0..oracle_index_range`
    pub oracle_index_range: u8,

    /// Registered airlines admitted without a vote
    pub bootstrap_airlines: usize,

    /// Credited payout relative to the premium
    pub payout: PayoutRatio,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            airline_ante: amount::units(10),
            premium_cap: amount::units(1),
            oracle_registration_fee: amount::units(1),
            oracle_quorum: 3,
            oracle_index_range: 10,
            bootstrap_airlines: 4,
            payout: PayoutRatio::STANDARD,
        }
    }
}
