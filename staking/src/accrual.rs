//! The accrual calculator.

use can_types::apy::BASIS_POINTS_DENOMINATOR;
use can_types::time::SECONDS_PER_YEAR;
use can_types::{Apy, CanAmount, Timestamp};

/// Seconds per year × basis points per 100%.
const REWARD_DENOMINATOR: u128 = SECONDS_PER_YEAR as u128 * BASIS_POINTS_DENOMINATOR as u128;

/// Reward accrued on `principal` between `staked_since` and `now`.
///
/// `reward = principal × apy_bps × elapsed_secs / (365 × 86400 × 10_000)`,
/// which is `amount × apy% × days / (365 × 100)` with fractional days.
/// Elapsed time is measured in whole seconds, so a window that has not
/// started yet (`now <= staked_since`) yields zero. Simple interest, no
/// compounding. Saturates at [`CanAmount::MAX`] if the intermediate
/// product overflows.
pub fn compute_reward(
    principal: CanAmount,
    apy: Apy,
    staked_since: Timestamp,
    now: Timestamp,
) -> CanAmount {
    compute_reward_checked(principal, apy, staked_since, now).unwrap_or(CanAmount::MAX)
}

/// Like [`compute_reward`] but returns `None` on overflow.
pub fn compute_reward_checked(
    principal: CanAmount,
    apy: Apy,
    staked_since: Timestamp,
    now: Timestamp,
) -> Option<CanAmount> {
    let elapsed = staked_since.elapsed_since(now) as u128;
    if elapsed == 0 || principal.is_zero() {
        return Some(CanAmount::ZERO);
    }
    let raw = principal
        .raw()
        .checked_mul(apy.bps() as u128)?
        .checked_mul(elapsed)?
        / REWARD_DENOMINATOR;
    Some(CanAmount::new(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use can_types::time::SECONDS_PER_DAY;

    #[test]
    fn one_year_at_ten_percent() {
        let now = Timestamp::new(400 * SECONDS_PER_DAY);
        let since = now.minus_days(365);
        let reward = compute_reward(CanAmount::from_can(1_000), Apy::COIN_DEFAULT, since, now);
        assert_eq!(reward, CanAmount::from_can(100));
    }

    #[test]
    fn fractional_days_accrue() {
        // Half a day on 365 CAN at 10%: 365 × 0.1 × 0.5 / 365 = 0.05 CAN.
        let reward = compute_reward(
            CanAmount::from_can(365),
            Apy::COIN_DEFAULT,
            Timestamp::new(0),
            Timestamp::new(SECONDS_PER_DAY / 2),
        );
        assert_eq!(reward, CanAmount::new(50_000));
    }

    #[test]
    fn future_window_is_zero() {
        let since = Timestamp::new(1_000);
        for now in [0, 999, 1_000] {
            assert_eq!(
                compute_reward(
                    CanAmount::from_can(5),
                    Apy::NFT_DEFAULT,
                    since,
                    Timestamp::new(now)
                ),
                CanAmount::ZERO
            );
        }
    }

    #[test]
    fn overflow_saturates() {
        let now = Timestamp::new(u64::MAX);
        assert_eq!(
            compute_reward_checked(CanAmount::MAX, Apy::COIN_DEFAULT, Timestamp::EPOCH, now),
            None
        );
        assert_eq!(
            compute_reward(CanAmount::MAX, Apy::COIN_DEFAULT, Timestamp::EPOCH, now),
            CanAmount::MAX
        );
    }
}
