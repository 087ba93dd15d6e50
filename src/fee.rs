//! Pot / fee / payout arithmetic for a single match.
//!
//! Uses a u128 intermediate to avoid overflow on the largest stake x
//! party-size products, with a fixed house rate and floor-division
//! semantics.

use crate::core_types::{PartySize, Stake};

/// House fee rate, expressed as a percentage (5%).
pub const FEE_RATE_PERCENT: u64 = 5;

/// Pot, fee, and payout for one match, per the canonical formula
/// `fee = floor(pot * 5/100)`, `payout = pot - fee`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FeeSchedule {
    pub pot: u64,
    pub fee: u64,
    pub payout: u64,
}

/// Compute the pot/fee/payout triple for `stake` committed by
/// `party_size` players.
///
/// Uses a u128 intermediate so `pot * FEE_RATE_PERCENT` cannot overflow
/// even at the largest allowed stake and party size.
pub fn compute(stake: Stake, party_size: PartySize) -> FeeSchedule {
    let pot = stake * party_size as u64;
    let fee = ((pot as u128 * FEE_RATE_PERCENT as u128) / 100) as u64;
    let payout = pot - fee;
    FeeSchedule { pot, fee, payout }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_canonical_formula() {
        // pot = 200, fee = floor(200*5/100) = 10, payout = 190
        let sched = compute(100, 2);
        assert_eq!(sched, FeeSchedule { pot: 200, fee: 10, payout: 190 });
    }

    #[test]
    fn floors_instead_of_rounding() {
        // pot = 500*3 = 1500, fee = floor(1500*5/100) = 75
        let sched = compute(500, 3);
        assert_eq!(sched.fee, 75);
        assert_eq!(sched.payout, sched.pot - sched.fee);
    }

    #[test]
    fn zero_stake_is_practice_mode() {
        let sched = compute(0, 4);
        assert_eq!(sched, FeeSchedule { pot: 0, fee: 0, payout: 0 });
    }

    #[test]
    fn no_overflow_at_max_denomination() {
        let sched = compute(10_000, 5);
        assert_eq!(sched.pot, 50_000);
        assert_eq!(sched.fee, 2_500);
        assert_eq!(sched.payout, 47_500);
    }
}
